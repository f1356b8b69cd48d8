//! Layered configuration for memoized computations
//!
//! A configuration is a stack of [`ConfigLayer`]s: a shared defaults layer at
//! the bottom and zero or more override layers above it. Resolution takes each
//! option from the nearest layer that sets it. Reconfiguring a wrapper merges
//! into its top override layer, so the defaults are never touched from a
//! call-site.

use crate::cache::{CacheValue, MaxAge, MemoryStore, Store};
use crate::error::{MemoError, Result};
use crate::key::{default_deriver, KeyDeriver, KeyRequest};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::iter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Environment variable holding the default max-age in seconds
pub const ENV_MAX_AGE: &str = "MEMOKIT_MAX_AGE";

/// Environment variable holding the simulated store delay in milliseconds
pub const ENV_SIMULATED_ASYNC_DELAY_MS: &str = "MEMOKIT_SIMULATED_ASYNC_DELAY_MS";

/// One layer of options; unset options fall through to lower layers
pub struct ConfigLayer<V: CacheValue> {
    max_age: Option<MaxAge>,
    store: Option<Arc<dyn Store<V>>>,
    key_deriver: Option<KeyDeriver>,
    name: Option<String>,
    simulated_async_delay: Option<Duration>,
    /// Options the engine does not interpret
    options: HashMap<String, Value>,
}

impl<V: CacheValue> ConfigLayer<V> {
    /// Create an empty layer
    pub fn new() -> Self {
        Self {
            max_age: None,
            store: None,
            key_deriver: None,
            name: None,
            simulated_async_delay: None,
            options: HashMap::new(),
        }
    }

    /// Built-in defaults: never expire, a fresh memory store, the default key
    pub fn defaults() -> Self {
        Self::new()
            .max_age(MaxAge::Never)
            .store(Arc::new(MemoryStore::<V>::new()))
            .key_deriver_arc(default_deriver())
    }

    /// Load a layer from `MEMOKIT_*` environment variables (and `.env`)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load a layer from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut layer = Self::new();

        if let Some(raw) = lookup(ENV_MAX_AGE) {
            let secs: i64 = raw.trim().parse().map_err(|e| {
                MemoError::ConfigError(format!("{}={:?}: {}", ENV_MAX_AGE, raw, e))
            })?;
            layer.max_age = Some(MaxAge::from_secs(secs));
        }

        if let Some(raw) = lookup(ENV_SIMULATED_ASYNC_DELAY_MS) {
            let millis: u64 = raw.trim().parse().map_err(|e| {
                MemoError::ConfigError(format!(
                    "{}={:?}: {}",
                    ENV_SIMULATED_ASYNC_DELAY_MS, raw, e
                ))
            })?;
            layer.simulated_async_delay = Some(Duration::from_millis(millis));
        }

        Ok(layer)
    }

    /// Set the max-age (accepts the integer form)
    pub fn max_age(mut self, max_age: impl Into<MaxAge>) -> Self {
        self.max_age = Some(max_age.into());
        self
    }

    /// Set the backing store
    pub fn store(mut self, store: Arc<dyn Store<V>>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the key deriver
    pub fn key_deriver<F>(self, deriver: F) -> Self
    where
        F: Fn(&KeyRequest<'_>) -> String + Send + Sync + 'static,
    {
        self.key_deriver_arc(Arc::new(deriver))
    }

    /// Set an already shared key deriver
    pub fn key_deriver_arc(mut self, deriver: KeyDeriver) -> Self {
        self.key_deriver = Some(deriver);
        self
    }

    /// Set the name used in keys instead of the inferred one
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Delay every store lookup (for exercising asynchronous stores in tests)
    pub fn simulated_async_delay(mut self, delay: Duration) -> Self {
        self.simulated_async_delay = Some(delay);
        self
    }

    /// Set an option the engine does not interpret
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Merge every option set in `partial` into this layer
    pub fn merge(&mut self, partial: ConfigLayer<V>) {
        let ConfigLayer {
            max_age,
            store,
            key_deriver,
            name,
            simulated_async_delay,
            options,
        } = partial;

        if max_age.is_some() {
            self.max_age = max_age;
        }
        if store.is_some() {
            self.store = store;
        }
        if key_deriver.is_some() {
            self.key_deriver = key_deriver;
        }
        if name.is_some() {
            self.name = name;
        }
        if simulated_async_delay.is_some() {
            self.simulated_async_delay = simulated_async_delay;
        }
        self.options.extend(options);
    }

    /// Check whether no option is set
    pub fn is_empty(&self) -> bool {
        self.max_age.is_none()
            && self.store.is_none()
            && self.key_deriver.is_none()
            && self.name.is_none()
            && self.simulated_async_delay.is_none()
            && self.options.is_empty()
    }
}

impl<V: CacheValue> Default for ConfigLayer<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: CacheValue> Clone for ConfigLayer<V> {
    fn clone(&self) -> Self {
        Self {
            max_age: self.max_age,
            store: self.store.clone(),
            key_deriver: self.key_deriver.clone(),
            name: self.name.clone(),
            simulated_async_delay: self.simulated_async_delay,
            options: self.options.clone(),
        }
    }
}

impl<V: CacheValue> fmt::Debug for ConfigLayer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLayer")
            .field("max_age", &self.max_age)
            .field("store", &self.store.as_ref().map(|_| "<store>"))
            .field("key_deriver", &self.key_deriver.as_ref().map(|_| "<fn>"))
            .field("name", &self.name)
            .field("simulated_async_delay", &self.simulated_async_delay)
            .field("options", &self.options)
            .finish()
    }
}

/// Fully resolved options for one invocation
pub struct ResolvedConfig<V: CacheValue> {
    pub max_age: MaxAge,
    pub store: Arc<dyn Store<V>>,
    pub key_deriver: KeyDeriver,
    pub name: Option<String>,
    pub simulated_async_delay: Option<Duration>,
    pub options: HashMap<String, Value>,
}

impl<V: CacheValue> ResolvedConfig<V> {
    /// Built-in defaults around the given store
    pub fn new(store: Arc<dyn Store<V>>) -> Self {
        Self {
            max_age: MaxAge::Never,
            store,
            key_deriver: default_deriver(),
            name: None,
            simulated_async_delay: None,
            options: HashMap::new(),
        }
    }

    /// Copy of this configuration with a different max-age
    pub fn with_max_age(&self, max_age: MaxAge) -> Self {
        Self {
            max_age,
            ..self.clone()
        }
    }

    /// Look up an option the engine does not interpret
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }
}

impl<V: CacheValue> Clone for ResolvedConfig<V> {
    fn clone(&self) -> Self {
        Self {
            max_age: self.max_age,
            store: Arc::clone(&self.store),
            key_deriver: Arc::clone(&self.key_deriver),
            name: self.name.clone(),
            simulated_async_delay: self.simulated_async_delay,
            options: self.options.clone(),
        }
    }
}

impl<V: CacheValue> fmt::Debug for ResolvedConfig<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("max_age", &self.max_age)
            .field("name", &self.name)
            .field("simulated_async_delay", &self.simulated_async_delay)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Resolve `overrides` (registration order) on top of `base`
///
/// Fails only when no layer provides a store.
pub fn resolve<V: CacheValue>(
    base: &ConfigLayer<V>,
    overrides: &[ConfigLayer<V>],
) -> Result<ResolvedConfig<V>> {
    // Nearest layer first
    let nearest = || overrides.iter().rev().chain(iter::once(base));

    let store = nearest()
        .find_map(|layer| layer.store.clone())
        .ok_or_else(|| MemoError::ConfigError("no store configured".to_string()))?;

    let mut options = HashMap::new();
    for layer in iter::once(base).chain(overrides.iter()) {
        options.extend(layer.options.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    Ok(ResolvedConfig {
        max_age: nearest().find_map(|layer| layer.max_age).unwrap_or_default(),
        store,
        key_deriver: nearest()
            .find_map(|layer| layer.key_deriver.clone())
            .unwrap_or_else(default_deriver),
        name: nearest().find_map(|layer| layer.name.clone()),
        simulated_async_delay: nearest().find_map(|layer| layer.simulated_async_delay),
        options,
    })
}

/// Live configuration of one memoized wrapper
///
/// The defaults layer is shared with the memoizer that created the wrapper,
/// so memoizer-level changes show through; the override layers belong to the
/// wrapper alone.
pub struct MemoConfig<V: CacheValue> {
    defaults: Arc<RwLock<ConfigLayer<V>>>,
    overrides: RwLock<Vec<ConfigLayer<V>>>,
}

impl<V: CacheValue> MemoConfig<V> {
    /// Configuration over a shared defaults layer
    pub fn new(defaults: Arc<RwLock<ConfigLayer<V>>>) -> Self {
        Self {
            defaults,
            overrides: RwLock::new(Vec::new()),
        }
    }

    /// Configuration over a private defaults layer
    pub fn standalone(defaults: ConfigLayer<V>) -> Self {
        Self::new(Arc::new(RwLock::new(defaults)))
    }

    /// Add an override layer while the configuration is still owned
    pub fn with_layer(mut self, layer: ConfigLayer<V>) -> Self {
        self.overrides.get_mut().push(layer);
        self
    }

    /// Add a new override layer on top
    pub async fn push_layer(&self, layer: ConfigLayer<V>) {
        self.overrides.write().await.push(layer);
    }

    /// Merge `partial` into the top override layer
    pub async fn configure(&self, partial: ConfigLayer<V>) {
        let mut overrides = self.overrides.write().await;
        match overrides.last_mut() {
            Some(top) => top.merge(partial),
            None => overrides.push(partial),
        }
    }

    /// Number of override layers
    pub async fn layer_count(&self) -> usize {
        self.overrides.read().await.len()
    }

    /// Resolve the current options
    pub async fn resolve(&self) -> Result<ResolvedConfig<V>> {
        let defaults = self.defaults.read().await;
        let overrides = self.overrides.read().await;
        resolve(&defaults, &overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let resolved = resolve::<i64>(&ConfigLayer::defaults(), &[]).unwrap();
        assert_eq!(resolved.max_age, MaxAge::Never);
        assert_eq!(resolved.name, None);
        assert_eq!(resolved.simulated_async_delay, None);
    }

    #[test]
    fn test_resolve_without_store_fails() {
        let err = resolve::<i64>(&ConfigLayer::new(), &[]).unwrap_err();
        assert!(matches!(err, MemoError::ConfigError(_)));
    }

    #[test]
    fn test_nearest_layer_wins() {
        let base = ConfigLayer::<i64>::defaults().max_age(10).name("base");
        let overrides = vec![
            ConfigLayer::new().max_age(20),
            ConfigLayer::new().max_age(30),
        ];

        let resolved = resolve(&base, &overrides).unwrap();
        assert_eq!(resolved.max_age, MaxAge::Seconds(30));
        assert_eq!(resolved.name.as_deref(), Some("base"));
    }

    #[test]
    fn test_merge_overwrites_only_set_fields() {
        let mut top = ConfigLayer::<i64>::new().max_age(30).name("first");
        top.merge(ConfigLayer::new().name("second").option("team", "search"));

        let resolved = resolve(&ConfigLayer::defaults(), &[top]).unwrap();
        assert_eq!(resolved.max_age, MaxAge::Seconds(30));
        assert_eq!(resolved.name.as_deref(), Some("second"));
        assert_eq!(resolved.option("team"), Some(&Value::from("search")));
    }

    #[test]
    fn test_unknown_options_layer_up() {
        let base = ConfigLayer::<i64>::defaults().option("a", 1).option("b", 1);
        let top = ConfigLayer::new().option("b", 2);

        let resolved = resolve(&base, &[top]).unwrap();
        assert_eq!(resolved.option("a"), Some(&Value::from(1)));
        assert_eq!(resolved.option("b"), Some(&Value::from(2)));
        assert_eq!(resolved.option("c"), None);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_MAX_AGE, "45"),
            (ENV_SIMULATED_ASYNC_DELAY_MS, "100"),
            ("MEMOKIT_NAME", "pricing"),
        ]
        .into_iter()
        .collect();

        let layer = ConfigLayer::<i64>::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        let resolved = resolve(&ConfigLayer::defaults(), &[layer]).unwrap();

        assert_eq!(resolved.max_age, MaxAge::Seconds(45));
        assert_eq!(resolved.simulated_async_delay, Some(Duration::from_millis(100)));
        // A shared name would give every wrapper of a memoizer the same keys
        assert_eq!(resolved.name, None);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ConfigLayer::<i64>::from_lookup(|k| {
            (k == ENV_MAX_AGE).then(|| "forever".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_AGE));
    }

    #[test]
    fn test_empty_lookup_gives_empty_layer() {
        let layer = ConfigLayer::<i64>::from_lookup(|_| None).unwrap();
        assert!(layer.is_empty());
    }

    #[tokio::test]
    async fn test_configure_merges_into_top_layer() {
        let config = MemoConfig::standalone(ConfigLayer::<i64>::defaults());
        config.configure(ConfigLayer::new().max_age(30)).await;
        config.configure(ConfigLayer::new().name("MMMM")).await;

        assert_eq!(config.layer_count().await, 1);
        let resolved = config.resolve().await.unwrap();
        assert_eq!(resolved.max_age, MaxAge::Seconds(30));
        assert_eq!(resolved.name.as_deref(), Some("MMMM"));
    }

    #[tokio::test]
    async fn test_push_layer_stacks_above_configured_layer() {
        let config = MemoConfig::standalone(ConfigLayer::<i64>::defaults());
        config.configure(ConfigLayer::new().max_age(30).name("first")).await;
        config.push_layer(ConfigLayer::new().max_age(5)).await;

        assert_eq!(config.layer_count().await, 2);
        let resolved = config.resolve().await.unwrap();
        assert_eq!(resolved.max_age, MaxAge::Seconds(5));
        assert_eq!(resolved.name.as_deref(), Some("first"));

        // configure now merges into the pushed layer
        config.configure(ConfigLayer::new().name("second")).await;
        assert_eq!(config.layer_count().await, 2);
        assert_eq!(config.resolve().await.unwrap().name.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_shared_defaults_show_through() {
        let defaults = Arc::new(RwLock::new(ConfigLayer::<i64>::defaults()));
        let config = MemoConfig::new(defaults.clone()).with_layer(ConfigLayer::new().name("x"));

        defaults.write().await.merge(ConfigLayer::new().max_age(30));

        let resolved = config.resolve().await.unwrap();
        assert_eq!(resolved.max_age, MaxAge::Seconds(30));
        assert_eq!(resolved.name.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_configure_leaves_defaults_alone() {
        let defaults = Arc::new(RwLock::new(ConfigLayer::<i64>::defaults()));
        let config = MemoConfig::new(defaults.clone());
        config.configure(ConfigLayer::new().max_age(0)).await;

        let untouched = resolve(&*defaults.read().await, &[]).unwrap();
        assert_eq!(untouched.max_age, MaxAge::Never);
        assert_eq!(config.resolve().await.unwrap().max_age, MaxAge::NoStore);
    }
}
