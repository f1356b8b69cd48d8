//! Builder API: attach memoization to a function
//!
//! A [`Memoizer`] owns the shared defaults layer. Each call to
//! [`Memoizer::memoize_sync`] or [`Memoizer::memoize`] returns a [`Memoized`]
//! wrapper with its own override layers on top of those defaults.

use crate::cache::CacheValue;
use crate::config::{ConfigLayer, MemoConfig, ResolvedConfig};
use crate::engine::{execute, Computation, Convention, Mode, Outcome, Request};
use crate::error::Result;
use serde::Serialize;
use std::any::type_name;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Factory for memoized wrappers sharing one defaults layer
pub struct Memoizer<V: CacheValue> {
    defaults: Arc<RwLock<ConfigLayer<V>>>,
}

impl<V: CacheValue> Memoizer<V> {
    /// Memoizer over the built-in defaults (shared memory store, never expire)
    pub fn new() -> Self {
        Self::with_defaults(ConfigLayer::new())
    }

    /// Memoizer whose defaults are the built-ins overridden by `layer`
    pub fn with_defaults(layer: ConfigLayer<V>) -> Self {
        let mut defaults = ConfigLayer::defaults();
        defaults.merge(layer);
        Self {
            defaults: Arc::new(RwLock::new(defaults)),
        }
    }

    /// Memoizer whose defaults come from `MEMOKIT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_defaults(ConfigLayer::from_env()?))
    }

    /// Change the defaults of every wrapper created by this memoizer
    pub async fn configure(&self, partial: ConfigLayer<V>) {
        self.defaults.write().await.merge(partial);
    }

    /// Resolve the defaults alone
    pub async fn resolve(&self) -> Result<ResolvedConfig<V>> {
        let defaults = self.defaults.read().await;
        crate::config::resolve(&defaults, &[])
    }

    /// Memoize a function that returns its value directly
    pub fn memoize_sync<A, F>(&self, f: F) -> Memoized<A, V>
    where
        A: Serialize + 'static,
        F: Fn(A) -> V + Send + Sync + 'static,
    {
        self.wrap(Computation::from_sync(f), type_name::<F>())
    }

    /// Memoize a function returning a future of `anyhow::Result<V>`
    pub fn memoize<A, F, Fut>(&self, f: F) -> Memoized<A, V>
    where
        A: Serialize + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.wrap(Computation::from_async(f), type_name::<F>())
    }

    fn wrap<A>(&self, computation: Computation<A, V>, type_name: &'static str) -> Memoized<A, V> {
        let fn_name = inferred_name(type_name);
        debug!("Memoizing {} ({})", fn_name, computation.convention());
        Memoized {
            computation,
            fn_name,
            config: MemoConfig::new(Arc::clone(&self.defaults)),
        }
    }
}

/// Key name for a wrapped function type
///
/// Closures in one function all report that function's path, so each wrapper
/// over a closure gets its own suffix. Fn items keep their plain path.
fn inferred_name(type_name: &'static str) -> String {
    if type_name.contains("{{closure}}") {
        format!("{}#{}", type_name, Uuid::new_v4().simple())
    } else {
        type_name.to_string()
    }
}

impl<V: CacheValue> Default for Memoizer<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: CacheValue> Clone for Memoizer<V> {
    fn clone(&self) -> Self {
        Self {
            defaults: Arc::clone(&self.defaults),
        }
    }
}

/// A memoized function with a live, reconfigurable configuration
pub struct Memoized<A, V: CacheValue> {
    computation: Computation<A, V>,
    fn_name: String,
    config: MemoConfig<V>,
}

impl<A, V> Memoized<A, V>
where
    A: Serialize,
    V: CacheValue,
{
    /// Add an override layer (builder form)
    pub fn with_options(self, layer: ConfigLayer<V>) -> Self {
        Self {
            config: self.config.with_layer(layer),
            ..self
        }
    }

    /// Register a name to use in keys instead of the inferred one
    pub fn named(self, name: impl Into<String>) -> Self {
        self.with_options(ConfigLayer::new().name(name))
    }

    /// Merge `partial` into this wrapper's top override layer
    pub async fn configure(&self, partial: ConfigLayer<V>) {
        self.config.configure(partial).await;
    }

    /// Run in the given mode, returning the value and the entry holding it
    pub async fn invoke(&self, mode: Mode<V>, args: A) -> Result<Outcome<V>> {
        let config = self.config.resolve().await?;
        execute(Request {
            computation: self.computation.clone(),
            fn_name: self.fn_name.clone(),
            args,
            mode,
            config,
        })
        .await
    }

    /// Cached value, computed and stored on a miss
    pub async fn call(&self, args: A) -> Result<V> {
        self.invoke(Mode::Normal, args).await.map(Outcome::into_value)
    }

    /// Cached value only; a miss is [`MemoError::CacheMiss`](crate::MemoError::CacheMiss)
    pub async fn cached(&self, args: A) -> Result<V> {
        self.invoke(Mode::CacheOnly, args).await.map(Outcome::into_value)
    }

    /// Recompute and overwrite
    pub async fn read_through(&self, args: A) -> Result<V> {
        self.invoke(Mode::ReadThrough, args).await.map(Outcome::into_value)
    }

    /// Store `value` for `args` without computing
    pub async fn write_through(&self, value: V, args: A) -> Result<V> {
        self.invoke(Mode::WriteThrough(value), args)
            .await
            .map(Outcome::into_value)
    }

    /// Name inferred from the wrapped function's type
    pub fn fn_name(&self) -> &str {
        &self.fn_name
    }

    pub fn convention(&self) -> Convention {
        self.computation.convention()
    }

    pub fn config(&self) -> &MemoConfig<V> {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MaxAge, MemoryStore};
    use crate::error::MemoError;

    fn add((a, b): (i64, i64)) -> i64 {
        a + b
    }

    #[tokio::test]
    async fn test_inferred_name() {
        let memo = Memoizer::new();
        let add = memo.memoize_sync(add);

        assert!(add.fn_name().ends_with("add"));
        assert!(!add.fn_name().contains('#'));
        assert_eq!(add.convention(), Convention::Sync);

        // The same fn item keeps one name across wrappers
        assert_eq!(memo.memoize_sync(self::add).fn_name(), add.fn_name());
    }

    #[test]
    fn test_closure_names_are_per_wrapper() {
        let memo = Memoizer::<i64>::new();
        let inc = memo.memoize_sync(|x: i64| x + 1);
        let again = memo.memoize_sync(|x: i64| x + 1);

        assert!(inc.fn_name().contains("{{closure}}#"));
        assert_ne!(inc.fn_name(), again.fn_name());
    }

    #[tokio::test]
    async fn test_named_wrapper_key() {
        let memo = Memoizer::new();
        let add = memo.memoize_sync(add).named("MMMM");

        add.call((20, 3)).await.unwrap();

        let store = memo.resolve().await.unwrap().store;
        let config = add.config().resolve().await.unwrap();
        assert!(store.get("memo-MMMM-[20,3]", &config).await.is_ok());
    }

    #[tokio::test]
    async fn test_memoizer_defaults_are_shared() {
        let memo = Memoizer::new();
        let add = memo.memoize_sync(add);

        memo.configure(ConfigLayer::new().max_age(0)).await;

        let config = add.config().resolve().await.unwrap();
        assert_eq!(config.max_age, MaxAge::NoStore);
        assert!(add.cached((1, 1)).await.is_err());
        add.call((1, 1)).await.unwrap();
        assert!(matches!(
            add.cached((1, 1)).await.unwrap_err(),
            MemoError::CacheMiss { .. }
        ));
    }

    #[tokio::test]
    async fn test_wrappers_share_the_default_store() {
        let memo = Memoizer::new();
        let first = memo.memoize_sync(add).named("add");
        let second = memo.memoize_sync(|(a, b): (i64, i64)| a * b).named("add");

        first.call((2, 3)).await.unwrap();
        assert_eq!(second.call((2, 3)).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_store_override_is_per_wrapper() {
        let memo = Memoizer::new();
        let isolated = memo
            .memoize_sync(add)
            .with_options(ConfigLayer::<i64>::new().store(Arc::new(MemoryStore::<i64>::new())));
        let shared = memo.memoize_sync(add);

        isolated.call((2, 3)).await.unwrap();
        assert!(shared.cached((2, 3)).await.is_err());
    }
}
