//! # Tiered Memo Stores
//!
//! Stores hold the entries produced by memoized computations. Every store
//! implements the same three-operation [`Store`] contract, so tiers can be
//! stacked freely:
//!
//! - [`MemoryStore`]: a process-local map with lazy TTL expiry
//! - [`ScopedStore`]: the same map, but one per active [`ExecutionContext`]
//! - [`ChainedStore`]: decorates any store with a lower-priority `previous`
//!   tier; misses fall through and hits are promoted upward with their
//!   remaining lifetime
//!
//! ## Example
//!
//! ```rust
//! use memokit::cache::{MemoryStore, Store};
//! use memokit::{MaxAge, ResolvedConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> memokit::Result<()> {
//! let slow: Arc<MemoryStore<String>> = Arc::new(MemoryStore::new());
//! let fast = MemoryStore::<String>::chained(slow.clone());
//!
//! let config = ResolvedConfig::<String>::new(slow.clone()).with_max_age(MaxAge::Seconds(60));
//! slow.set("greeting", &config, Some("hello".to_string())).await;
//!
//! // Miss in the fast tier, hit in the slow one, promoted on the way up
//! let entry = fast.get("greeting", &config).await?;
//! assert_eq!(entry.value(), "hello");
//! assert_eq!(fast.local().len().await, 1);
//! # Ok(())
//! # }
//! ```

pub mod chained;
pub mod entry;
pub mod scoped;
pub mod store;
pub mod types;

pub use chained::ChainedStore;
pub use entry::{Entry, Expiry, MaxAge};
pub use scoped::{ExecutionContext, ScopedStore};
pub use store::{start_auto_purge, MemoryStore};
pub use types::{CacheKey, CacheValue, StoreStats};

use crate::config::ResolvedConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Capability contract for a memo store tier
///
/// `get` reports a miss with [`MemoError::NotFound`](crate::MemoError::NotFound);
/// the engine never surfaces that error to callers. Entries returned by `get`
/// and `set` are shared, immutable snapshots of a single write.
#[async_trait]
pub trait Store<V: CacheValue>: Send + Sync {
    /// Look up the live entry for `key`, dropping it if it has expired
    async fn get(&self, key: &str, config: &ResolvedConfig<V>) -> Result<Arc<Entry<V>>>;

    /// Store `value` under `key` using `config.max_age`
    ///
    /// A `None` value or a no-store max-age deletes any existing entry and
    /// returns `None`.
    async fn set(
        &self,
        key: &str,
        config: &ResolvedConfig<V>,
        value: Option<V>,
    ) -> Option<Arc<Entry<V>>>;

    /// Remove every entry reachable from this store
    async fn clear(&self);
}
