//! Stores partitioned by the active execution context
//!
//! An [`ExecutionContext`] is a logical unit of work (an inbound request, a
//! job) entered with [`ExecutionContext::run`]. While a future runs inside a
//! context, every [`ScopedStore`] resolves its backing map from that context,
//! creating and attaching one on first use. Two contexts never see each
//! other's entries, and dropping the context drops its maps.
//!
//! The context is a `tokio` task-local: it follows the future it was entered
//! with, but is not inherited by tasks spawned from inside it.

use crate::cache::{
    chained::ChainedStore,
    entry::Entry,
    store::Tier,
    types::{CacheValue, StoreStats},
    Store,
};
use crate::config::ResolvedConfig;
use crate::error::{MemoError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

tokio::task_local! {
    static ACTIVE_CONTEXT: ExecutionContext;
}

type Slot = Arc<dyn Any + Send + Sync>;

/// A logical unit of work that owns its own cache maps
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    id: Uuid,
    created_at: DateTime<Utc>,
    /// Backing maps keyed by the id of the store that attached them
    slots: Mutex<HashMap<Uuid, Slot>>,
}

impl ExecutionContext {
    /// Create a fresh context with no attached maps
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// The context the current task is running in, if any
    pub fn current() -> Option<Self> {
        ACTIVE_CONTEXT.try_with(|ctx| ctx.clone()).ok()
    }

    /// Run `fut` with this context active
    pub async fn run<F: Future>(self, fut: F) -> F::Output {
        debug!("Entering execution context {}", self.inner.id);
        ACTIVE_CONTEXT.scope(self, fut).await
    }

    /// Number of stores that have attached a map to this context
    pub async fn attached_stores(&self) -> usize {
        self.inner.slots.lock().await.len()
    }

    /// Check whether the given store has attached a map to this context
    pub async fn is_attached(&self, store_id: Uuid) -> bool {
        self.inner.slots.lock().await.contains_key(&store_id)
    }

    /// Get the value attached under `slot`, creating it on first use
    pub(crate) async fn attach<T>(&self, slot: Uuid) -> Arc<T>
    where
        T: Default + Send + Sync + 'static,
    {
        let mut slots = self.inner.slots.lock().await;
        if let Some(existing) = slots.get(&slot) {
            if let Ok(typed) = Arc::clone(existing).downcast::<T>() {
                return typed;
            }
        }

        debug!("Attaching store {} to execution context {}", slot, self.inner.id);
        let fresh = Arc::new(T::default());
        slots.insert(slot, Arc::clone(&fresh) as Slot);
        fresh
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.inner.id)
            .field("created_at", &self.inner.created_at)
            .finish()
    }
}

/// Memory store whose entries live in the active [`ExecutionContext`]
///
/// Outside of any context the store has no local map: reads miss and writes
/// are dropped. Wrap it with [`ScopedStore::chained`] to put a process-wide
/// tier underneath.
pub struct ScopedStore<V> {
    id: Uuid,
    _value: PhantomData<fn() -> V>,
}

impl<V: CacheValue> ScopedStore<V> {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            _value: PhantomData,
        }
    }

    /// Create a scoped store backed by a lower-priority `previous` tier
    pub fn chained(previous: Arc<dyn Store<V>>) -> ChainedStore<Self, V> {
        ChainedStore::new(Self::new(), Some(previous))
    }

    /// Identifier under which this store attaches its maps
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of entries in the active context's map
    pub async fn len(&self) -> usize {
        match self.active_tier().await {
            Some(tier) => tier.read().await.len(),
            None => 0,
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Statistics of the active context's map
    pub async fn stats(&self) -> Option<StoreStats> {
        match self.active_tier().await {
            Some(tier) => Some(tier.read().await.stats()),
            None => None,
        }
    }

    async fn active_tier(&self) -> Option<Arc<RwLock<Tier<V>>>> {
        match ExecutionContext::current() {
            Some(ctx) => Some(ctx.attach::<RwLock<Tier<V>>>(self.id).await),
            None => None,
        }
    }
}

impl<V: CacheValue> Default for ScopedStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V: CacheValue> Store<V> for ScopedStore<V> {
    async fn get(&self, key: &str, config: &ResolvedConfig<V>) -> Result<Arc<Entry<V>>> {
        if let Some(delay) = config.simulated_async_delay {
            tokio::time::sleep(delay).await;
        }

        let Some(tier) = self.active_tier().await else {
            debug!("No active execution context, scoped lookup misses: {}", key);
            return Err(MemoError::NotFound {
                key: key.to_string(),
            });
        };

        let found = tier.write().await.lookup(key, Utc::now());
        found.ok_or_else(|| MemoError::NotFound {
            key: key.to_string(),
        })
    }

    async fn set(
        &self,
        key: &str,
        config: &ResolvedConfig<V>,
        value: Option<V>,
    ) -> Option<Arc<Entry<V>>> {
        let Some(tier) = self.active_tier().await else {
            debug!("No active execution context, scoped write dropped: {}", key);
            return None;
        };

        let written = tier.write().await.write(key, config.max_age, value, Utc::now());
        written
    }

    async fn clear(&self) {
        if let (Some(ctx), Some(tier)) = (ExecutionContext::current(), self.active_tier().await) {
            let count = tier.write().await.clear();
            info!("Cleared {} entries from execution context {}", count, ctx.id());
        }
    }
}
