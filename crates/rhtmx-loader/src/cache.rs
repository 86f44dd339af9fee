//! Cache entry types and utilities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;

/// A cached resource with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The parsed value
    pub value: Value,

    /// Change-detection token (etag / last-modified) of the response
    pub token: Option<String>,

    /// When the value was last fetched
    pub fetched_at: DateTime<Utc>,

    /// Tags for invalidation
    pub tags: BTreeSet<String>,

    /// Version the entry was written under
    pub version: Option<String>,
}

impl CacheEntry {
    /// Create a new cache entry fetched now
    pub fn new(value: Value, token: Option<String>) -> Self {
        Self {
            value,
            token,
            fetched_at: Utc::now(),
            tags: BTreeSet::new(),
            version: None,
        }
    }

    /// Get the age of the entry
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    /// Check if the entry is older than `after`
    pub fn is_stale(&self, after: Duration) -> bool {
        self.age() >= after
    }

    /// Check if the entry is still within `ttl`
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        !self.is_stale(ttl)
    }

    /// Whether the entry may serve a request asking for `version`
    ///
    /// A request without a version accepts any entry.
    pub fn serves_version(&self, version: Option<&str>) -> bool {
        match version {
            Some(wanted) => self.version.as_deref() == Some(wanted),
            None => true,
        }
    }

    /// Whether a refetched `(value, token)` is the same data as this entry
    ///
    /// Tokens are compared when both sides carry one; otherwise the values
    /// are compared structurally.
    pub fn is_unchanged(&self, value: &Value, token: Option<&str>) -> bool {
        match (self.token.as_deref(), token) {
            (Some(old), Some(new)) => old == new,
            _ => &self.value == value,
        }
    }
}

/// Statistics for the resource cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses
    pub misses: u64,

    /// Total number of transport fetches started
    pub fetches: u64,

    /// Background refreshes that produced changed data
    pub revalidations: u64,

    /// Entries removed by invalidation
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
