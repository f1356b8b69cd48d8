//! Execution engine
//!
//! [`execute`] runs one memoized invocation: it derives the key, consults or
//! bypasses the configured store according to the [`Mode`], runs the
//! computation on a genuine miss and persists the result.

use crate::cache::{CacheValue, Entry};
use crate::config::ResolvedConfig;
use crate::error::{MemoError, Result};
use crate::key::{serialize_args, KeyRequest};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Calling convention of a wrapped computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Convention {
    /// Returns its value directly
    Sync,
    /// Resolves to `anyhow::Result<V>`
    Async,
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Convention::Sync => write!(f, "sync"),
            Convention::Async => write!(f, "async"),
        }
    }
}

/// How an invocation uses the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode<V> {
    /// Return the cached value, computing and storing it on a miss
    Normal,
    /// Return the cached value or fail with [`MemoError::CacheMiss`]
    CacheOnly,
    /// Always compute and overwrite
    ReadThrough,
    /// Store the given value without computing
    WriteThrough(V),
}

impl<V> Mode<V> {
    /// Whether this mode consults the store before computing
    pub fn looks_up(&self) -> bool {
        matches!(self, Mode::Normal | Mode::CacheOnly)
    }
}

impl<V> fmt::Display for Mode<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Normal => write!(f, "normal"),
            Mode::CacheOnly => write!(f, "cache-only"),
            Mode::ReadThrough => write!(f, "read-through"),
            Mode::WriteThrough(_) => write!(f, "write-through"),
        }
    }
}

pub type SyncFn<A, V> = Arc<dyn Fn(A) -> V + Send + Sync>;
pub type AsyncFn<A, V> = Arc<dyn Fn(A) -> BoxFuture<'static, anyhow::Result<V>> + Send + Sync>;

/// A wrapped computation in one of the two calling conventions
pub enum Computation<A, V> {
    Sync(SyncFn<A, V>),
    Async(AsyncFn<A, V>),
}

impl<A, V> Computation<A, V> {
    pub fn from_sync<F>(f: F) -> Self
    where
        F: Fn(A) -> V + Send + Sync + 'static,
    {
        Computation::Sync(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        Computation::Async(Arc::new(move |args| f(args).boxed()))
    }

    pub fn convention(&self) -> Convention {
        match self {
            Computation::Sync(_) => Convention::Sync,
            Computation::Async(_) => Convention::Async,
        }
    }

    async fn run(&self, args: A) -> Result<V> {
        match self {
            Computation::Sync(f) => Ok(f(args)),
            Computation::Async(f) => f(args).await.map_err(MemoError::Computation),
        }
    }
}

impl<A, V> Clone for Computation<A, V> {
    fn clone(&self) -> Self {
        match self {
            Computation::Sync(f) => Computation::Sync(Arc::clone(f)),
            Computation::Async(f) => Computation::Async(Arc::clone(f)),
        }
    }
}

impl<A, V> fmt::Debug for Computation<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Computation::{:?}", self.convention())
    }
}

/// One invocation, built fresh per call
pub struct Request<A, V: CacheValue> {
    pub computation: Computation<A, V>,

    /// Name inferred for the computation, used when none is registered
    pub fn_name: String,

    pub args: A,
    pub mode: Mode<V>,
    pub config: ResolvedConfig<V>,
}

/// Result of an invocation
#[derive(Debug, Clone)]
pub struct Outcome<V> {
    pub value: V,

    /// Entry holding `value`, or `None` when nothing was stored
    pub entry: Option<Arc<Entry<V>>>,
}

impl<V: Clone> Outcome<V> {
    fn hit(entry: Arc<Entry<V>>) -> Self {
        Self {
            value: entry.value().clone(),
            entry: Some(entry),
        }
    }

    /// Whether `other` came from the very same store write
    pub fn same_entry(&self, other: &Outcome<V>) -> bool {
        match (&self.entry, &other.entry) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn into_value(self) -> V {
        self.value
    }
}

/// Run one memoized invocation
pub async fn execute<A, V>(request: Request<A, V>) -> Result<Outcome<V>>
where
    A: Serialize,
    V: CacheValue,
{
    let Request {
        computation,
        fn_name,
        args,
        mode,
        config,
    } = request;

    let serialized = serialize_args(&args)?;
    let key = (config.key_deriver)(&KeyRequest {
        name: config.name.as_deref(),
        fn_name: &fn_name,
        args: &serialized,
        convention: computation.convention(),
    });

    if mode.looks_up() {
        match config.store.get(&key, &config).await {
            Ok(entry) => {
                debug!("Memo hit: {}", key);
                return Ok(Outcome::hit(entry));
            }
            Err(MemoError::NotFound { .. }) => debug!("Memo miss: {}", key),
            Err(e) => warn!("Memo lookup for {} failed, treating as a miss: {}", key, e),
        }
    }

    let value = match mode {
        Mode::CacheOnly => return Err(MemoError::CacheMiss { key }),
        Mode::WriteThrough(value) => {
            debug!("Memo write-through: {}", key);
            value
        }
        Mode::Normal | Mode::ReadThrough => {
            debug!("Running {} computation for {}", computation.convention(), key);
            computation.run(args).await?
        }
    };

    let entry = config.store.set(&key, &config, Some(value.clone())).await;
    Ok(Outcome { value, entry })
}
