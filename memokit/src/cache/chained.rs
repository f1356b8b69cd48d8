//! Tiered store: a local tier in front of a lower-priority one

use crate::cache::{entry::Entry, types::CacheValue, Store};
use crate::config::ResolvedConfig;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Decorates a store with an optional `previous` tier
///
/// Writes go to `previous` first and then to the local tier. Reads try the
/// local tier; on a miss they fall through to `previous`, and a live hit there
/// is promoted into the local tier with a max-age capped by the remaining
/// lifetime of the source entry, so a promoted copy never outlives it.
pub struct ChainedStore<S, V> {
    /// Higher-priority tier
    local: S,

    /// Lower-priority tier consulted on local misses
    previous: Option<Arc<dyn Store<V>>>,

    /// Number of values copied up from `previous`
    promotions: AtomicU64,

    _value: PhantomData<fn() -> V>,
}

impl<S, V> ChainedStore<S, V>
where
    S: Store<V>,
    V: CacheValue,
{
    /// Wrap `local`, optionally in front of `previous`
    pub fn new(local: S, previous: Option<Arc<dyn Store<V>>>) -> Self {
        Self {
            local,
            previous,
            promotions: AtomicU64::new(0),
            _value: PhantomData,
        }
    }

    /// The local tier
    pub fn local(&self) -> &S {
        &self.local
    }

    /// The lower-priority tier, if any
    pub fn previous(&self) -> Option<&Arc<dyn Store<V>>> {
        self.previous.as_ref()
    }

    /// Number of promotions performed so far
    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<S, V> Store<V> for ChainedStore<S, V>
where
    S: Store<V>,
    V: CacheValue,
{
    async fn get(&self, key: &str, config: &ResolvedConfig<V>) -> Result<Arc<Entry<V>>> {
        let local_miss = match self.local.get(key, config).await {
            Ok(entry) => return Ok(entry),
            Err(e) => e,
        };

        let Some(previous) = &self.previous else {
            return Err(local_miss);
        };

        let entry = previous.get(key, config).await?;

        let now = Utc::now();
        if entry.expires().is_expired_at(now) {
            debug!("Previous tier returned an expired entry, not promoting: {}", key);
            return Ok(entry);
        }

        let promoted_config = config.with_max_age(entry.expires().max_age_at(now));
        let promoted = self
            .local
            .set(key, &promoted_config, Some(entry.value().clone()))
            .await;
        self.promotions.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Promoted {} from previous tier (max age {})",
            key, promoted_config.max_age
        );

        Ok(promoted.unwrap_or(entry))
    }

    async fn set(
        &self,
        key: &str,
        config: &ResolvedConfig<V>,
        value: Option<V>,
    ) -> Option<Arc<Entry<V>>> {
        if let Some(previous) = &self.previous {
            previous.set(key, config, value.clone()).await;
        }
        self.local.set(key, config, value).await
    }

    async fn clear(&self) {
        self.local.clear().await;
    }
}
