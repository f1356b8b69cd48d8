//! Error types for memoized execution
//!
//! Store misses and cache-only misses are distinct variants: the former is an
//! internal control signal between a store and the engine, the latter is what
//! a caller sees when asking for a cached value that does not exist.

use thiserror::Error;

/// Main error type for memoization operations
#[derive(Error, Debug)]
pub enum MemoError {
    /// No live entry for the key in the store (handled by the engine)
    #[error("Not found: {key}")]
    NotFound { key: String },

    /// A cache-only lookup found no live entry
    #[error("Cache miss: {key}")]
    CacheMiss { key: String },

    /// The wrapped computation failed; the original error is kept as-is
    #[error(transparent)]
    Computation(anyhow::Error),

    /// Arguments could not be serialized into a cache key
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl MemoError {
    /// Whether this error is a store-level miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, MemoError::NotFound { .. })
    }

    /// Whether this error is a cache-only miss
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, MemoError::CacheMiss { .. })
    }
}

/// Result type alias for memoization operations
pub type Result<T> = std::result::Result<T, MemoError>;

impl From<String> for MemoError {
    fn from(s: String) -> Self {
        MemoError::Other(s)
    }
}

impl From<&str> for MemoError {
    fn from(s: &str) -> Self {
        MemoError::Other(s.to_string())
    }
}
