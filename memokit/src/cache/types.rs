//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key type - the output of a key deriver
pub type CacheKey = String;

/// Values that can be memoized
///
/// Entries are shared across tasks and handed back to callers by value, so a
/// cached value must be cheap enough to clone and safe to send.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

/// Counters kept by a single store tier
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Lookups that found a live entry
    pub hits: u64,

    /// Lookups that found nothing or an expired entry
    pub misses: u64,

    /// Entries dropped because they expired (lazily or by a purge)
    pub expired: u64,

    /// Writes that produced a new entry
    pub writes: u64,

    /// Writes that deleted instead of storing (no value or no-store max-age)
    pub skipped_writes: u64,

    /// Number of entries currently held
    pub entries: usize,
}

impl StoreStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    /// Total lookups served
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, writes: {}, expired: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.writes,
            self.expired
        )
    }
}
