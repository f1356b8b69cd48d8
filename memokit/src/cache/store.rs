//! Process-local memory store with lazy TTL expiry

use crate::cache::{
    chained::ChainedStore,
    entry::{Entry, MaxAge},
    types::{CacheKey, CacheValue, StoreStats},
    Store,
};
use crate::config::ResolvedConfig;
use crate::error::{MemoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A single tier's entries plus its counters
///
/// Shared by [`MemoryStore`] and the per-context maps of
/// [`ScopedStore`](crate::cache::ScopedStore).
pub(crate) struct Tier<V> {
    /// Main storage: key -> entry
    entries: HashMap<CacheKey, Arc<Entry<V>>>,

    /// Lookup and write counters
    stats: StoreStats,
}

impl<V> Default for Tier<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            stats: StoreStats::default(),
        }
    }
}

impl<V> Tier<V> {
    /// Return the live entry for `key`, removing it if it expired
    pub(crate) fn lookup(&mut self, key: &str, now: DateTime<Utc>) -> Option<Arc<Entry<V>>> {
        match self.entries.get(key) {
            Some(entry) if entry.expires().is_expired_at(now) => {
                debug!("Memo entry expired: {}", key);
                self.entries.remove(key);
                self.stats.expired += 1;
                self.stats.misses += 1;
                None
            }
            Some(entry) => {
                self.stats.hits += 1;
                Some(Arc::clone(entry))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Replace the entry for `key` according to `max_age`
    pub(crate) fn write(
        &mut self,
        key: &str,
        max_age: MaxAge,
        value: Option<V>,
        now: DateTime<Utc>,
    ) -> Option<Arc<Entry<V>>> {
        let expiry = max_age.expiry_from(now);
        let (Some(value), Some(expires)) = (value, expiry) else {
            debug!("Not storing {} (max age {}), removing any entry", key, max_age);
            self.entries.remove(key);
            self.stats.skipped_writes += 1;
            return None;
        };

        let entry = Arc::new(Entry::new(value, expires));
        self.entries.insert(key.to_string(), Arc::clone(&entry));
        self.stats.writes += 1;
        Some(entry)
    }

    /// Drop every entry, returning how many were held
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Drop every entry that expired before `now`
    pub(crate) fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.expires().is_expired_at(now));
        let removed = before - self.entries.len();
        self.stats.expired += removed as u64;
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.entries.len(),
            ..self.stats.clone()
        }
    }
}

/// In-memory store shared by everything that holds a handle to it
///
/// Expired entries are removed lazily when read, or in bulk by
/// [`MemoryStore::purge_expired`].
pub struct MemoryStore<V> {
    tier: RwLock<Tier<V>>,
}

impl<V: CacheValue> MemoryStore<V> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tier: RwLock::new(Tier::default()),
        }
    }

    /// Create an empty store backed by a lower-priority `previous` tier
    pub fn chained(previous: Arc<dyn Store<V>>) -> ChainedStore<Self, V> {
        ChainedStore::new(Self::new(), Some(previous))
    }

    /// Number of entries held, including expired ones not yet removed
    pub async fn len(&self) -> usize {
        self.tier.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Check if a key exists (without expiry check or stats update)
    pub async fn contains_key(&self, key: &str) -> bool {
        self.tier.read().await.contains_key(key)
    }

    /// Get store statistics
    pub async fn stats(&self) -> StoreStats {
        self.tier.read().await.stats()
    }

    /// Remove all expired entries
    pub async fn purge_expired(&self) -> usize {
        let removed = self.tier.write().await.purge_expired(Utc::now());
        if removed > 0 {
            debug!("Purged {} expired entries", removed);
        }
        removed
    }
}

impl<V: CacheValue> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V: CacheValue> Store<V> for MemoryStore<V> {
    async fn get(&self, key: &str, config: &ResolvedConfig<V>) -> Result<Arc<Entry<V>>> {
        if let Some(delay) = config.simulated_async_delay {
            tokio::time::sleep(delay).await;
        }

        self.tier
            .write()
            .await
            .lookup(key, Utc::now())
            .ok_or_else(|| MemoError::NotFound {
                key: key.to_string(),
            })
    }

    async fn set(
        &self,
        key: &str,
        config: &ResolvedConfig<V>,
        value: Option<V>,
    ) -> Option<Arc<Entry<V>>> {
        self.tier
            .write()
            .await
            .write(key, config.max_age, value, Utc::now())
    }

    async fn clear(&self) {
        let count = self.tier.write().await.clear();
        info!("Cleared {} entries from memory store", count);
    }
}

/// Background task that periodically purges expired entries
pub async fn start_auto_purge<V: CacheValue>(store: Arc<MemoryStore<V>>, interval: Duration) {
    info!("Starting automatic purge task (interval: {:?})", interval);

    loop {
        tokio::time::sleep(interval).await;
        store.purge_expired().await;
    }
}
