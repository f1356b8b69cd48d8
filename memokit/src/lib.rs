//! # memokit
//!
//! Memoization of sync and async computations over pluggable, tiered stores
//! with time-to-live expiry.
//!
//! ## Features
//!
//! - Four execution modes: normal, cache-only, read-through, write-through
//! - Sync and async computations (async errors are never cached)
//! - Stores with lazy TTL expiry: process-wide, per execution context, and
//!   chained tiers with promotion
//! - Layered configuration with late, per-wrapper overrides
//! - Pluggable key derivation
//!
//! ## Memoizing a Function
//!
//! ```no_run
//! use memokit::{ConfigLayer, Memoizer};
//!
//! fn add((a, b): (i64, i64)) -> i64 {
//!     a + b
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let memo = Memoizer::with_defaults(ConfigLayer::new().max_age(30));
//!     let add = memo.memoize_sync(add);
//!
//!     assert_eq!(add.call((20, 3)).await?, 23);
//!     assert_eq!(add.cached((20, 3)).await?, 23);
//!
//!     // Replace the cached value without running `add`
//!     add.write_through(52, (20, 3)).await?;
//!     assert_eq!(add.call((20, 3)).await?, 52);
//!     Ok(())
//! }
//! ```
//!
//! ## Async Computations
//!
//! ```no_run
//! use memokit::Memoizer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let memo = Memoizer::new();
//!     let lookup = memo
//!         .memoize(|id: u64| async move { Ok::<_, anyhow::Error>(format!("user-{}", id)) })
//!         .named("lookup");
//!
//!     println!("{}", lookup.call(7).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Per-Context Caching
//!
//! ```no_run
//! use memokit::{ConfigLayer, ExecutionContext, Memoizer, MemoryStore, ScopedStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let shared = Arc::new(MemoryStore::<i64>::new());
//!     let store = Arc::new(ScopedStore::<i64>::chained(shared));
//!     let memo = Memoizer::with_defaults(ConfigLayer::<i64>::new().store(store).max_age(60));
//!     let square = memo.memoize_sync(|x: i64| x * x).named("square");
//!
//!     ExecutionContext::new()
//!         .run(async { square.call(12).await })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod memoize;

// Re-export main types for convenience
pub use cache::{
    start_auto_purge, CacheKey, CacheValue, ChainedStore, Entry, ExecutionContext, Expiry, MaxAge,
    MemoryStore, ScopedStore, Store, StoreStats,
};
pub use config::{resolve, ConfigLayer, MemoConfig, ResolvedConfig};
pub use engine::{execute, Computation, Convention, Mode, Outcome, Request};
pub use error::{MemoError, Result};
pub use key::{default_deriver, default_key, KeyDeriver, KeyRequest};
pub use memoize::{Memoized, Memoizer};
