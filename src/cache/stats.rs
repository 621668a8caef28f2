//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::Serialize;

// == Counters ==
/// Running hit/miss/eviction counters of a cache.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted due to capacity
    pub evictions: u64,
}

impl Counters {
    // == Constructor ==
    /// Creates a new Counters with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}

// == Cache Stats ==
/// Point-in-time statistics of a single-tier cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,
    /// Capacity in entries
    pub max_size: usize,
    /// Sum of the estimated entry sizes in bytes
    pub total_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// hits / (hits + misses), 0 when there were no lookups
    pub hit_rate: f64,
}

impl CacheStats {
    /// Builds a stats snapshot from counters and current occupancy.
    pub fn new(counters: &Counters, size: usize, max_size: usize, total_size: usize) -> Self {
        Self {
            size,
            max_size,
            total_size,
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            hit_rate: counters.hit_rate(),
        }
    }
}

// == Multi-Level Stats ==
/// Per-tier statistics of a [`MultiLevelCache`](crate::MultiLevelCache).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiLevelStats {
    pub fast_tier: CacheStats,
    pub durable_tier: CacheStats,
}
