//! Cache entries and their expiry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest TTL representable as a `chrono::Duration`
const MAX_TTL_SECS: i64 = i64::MAX / 1_000;

/// Time-to-live policy applied when a value is written
///
/// The integer form used by configuration is `-1` (never expire), `0` (never
/// store) and `n > 0` (expire `n` seconds after the write).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxAge {
    /// Entries never expire
    #[default]
    Never,
    /// Values are never stored; writes delete any existing entry
    NoStore,
    /// Entries expire this many seconds after being written
    Seconds(u64),
}

impl MaxAge {
    /// Build from the integer form (any negative value means never)
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            s if s < 0 => MaxAge::Never,
            0 => MaxAge::NoStore,
            s => MaxAge::Seconds(s as u64),
        }
    }

    /// Integer form of this policy
    pub fn as_secs(&self) -> i64 {
        match self {
            MaxAge::Never => -1,
            MaxAge::NoStore => 0,
            MaxAge::Seconds(s) => i64::try_from(*s).unwrap_or(i64::MAX),
        }
    }

    /// Expiry of an entry written at `now` under this policy
    ///
    /// Returns `None` for [`MaxAge::NoStore`].
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Option<Expiry> {
        match self {
            MaxAge::Never => Some(Expiry::Never),
            MaxAge::NoStore => None,
            MaxAge::Seconds(s) => {
                let secs = i64::try_from(*s).unwrap_or(i64::MAX).min(MAX_TTL_SECS);
                let ttl = chrono::Duration::seconds(secs);
                Some(match now.checked_add_signed(ttl) {
                    Some(at) => Expiry::At(at),
                    None => Expiry::Never,
                })
            }
        }
    }
}

impl From<i64> for MaxAge {
    fn from(secs: i64) -> Self {
        MaxAge::from_secs(secs)
    }
}

impl From<i32> for MaxAge {
    fn from(secs: i32) -> Self {
        MaxAge::from_secs(i64::from(secs))
    }
}

impl fmt::Display for MaxAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxAge::Never => write!(f, "never"),
            MaxAge::NoStore => write!(f, "no-store"),
            MaxAge::Seconds(s) => write!(f, "{}s", s),
        }
    }
}

/// When an entry stops being live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiry {
    /// The entry does not expire
    Never,
    /// The entry expires at this instant
    At(DateTime<Utc>),
}

impl Expiry {
    /// Check whether the entry is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(at) => *at < now,
        }
    }

    /// Remaining lifetime at `now`, if bounded
    ///
    /// `None` means the entry never expires. An already expired entry yields a
    /// zero duration.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        match self {
            Expiry::Never => None,
            Expiry::At(at) => Some((*at - now).max(chrono::Duration::zero())),
        }
    }

    /// Max-age that reproduces this expiry (or an earlier one) when written at `now`
    ///
    /// Seconds are floored so a copy never outlives its source.
    pub fn max_age_at(&self, now: DateTime<Utc>) -> MaxAge {
        match self.remaining_at(now) {
            None => MaxAge::Never,
            Some(remaining) => MaxAge::from_secs(remaining.num_seconds()),
        }
    }
}

/// An immutable cached value with expiry metadata
///
/// Stores hand entries out behind an `Arc`; a new entry is created on every
/// write, so pointer equality means "the same write".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<V> {
    /// The cached value
    value: V,

    /// When the entry expires
    expires: Expiry,

    /// When the entry was written
    created_at: DateTime<Utc>,
}

impl<V> Entry<V> {
    /// Create an entry with an explicit expiry
    pub fn new(value: V, expires: Expiry) -> Self {
        Self {
            value,
            expires,
            created_at: Utc::now(),
        }
    }

    /// The cached value
    pub fn value(&self) -> &V {
        &self.value
    }

    /// The entry's expiry
    pub fn expires(&self) -> Expiry {
        self.expires
    }

    /// Expiry instant, or `None` when the entry never expires
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self.expires {
            Expiry::Never => None,
            Expiry::At(at) => Some(at),
        }
    }

    /// When the entry was written
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.expires.is_expired_at(Utc::now())
    }

    /// Get time until expiration (`None` if it never expires or already expired)
    pub fn time_until_expiration(&self) -> Option<std::time::Duration> {
        self.expires
            .remaining_at(Utc::now())
            .and_then(|remaining| remaining.to_std().ok())
            .filter(|remaining| !remaining.is_zero())
    }

    /// Get the age of the entry
    pub fn age(&self) -> std::time::Duration {
        (Utc::now() - self.created_at)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(0))
    }
}
