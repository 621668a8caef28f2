//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, policy-driven eviction,
//! optional snapshot persistence and a two-tier composite cache.

mod entry;
mod eviction;
mod handle;
mod multi_level;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use eviction::EvictionPolicy;
pub use handle::Cache;
pub use multi_level::{
    MultiLevelCache, DURABLE_TIER_MAX_AGE, DURABLE_TIER_MAX_SIZE, DURABLE_TIER_STORAGE_KEY,
    FAST_TIER_MAX_AGE, FAST_TIER_MAX_SIZE,
};
pub use stats::{CacheStats, Counters, MultiLevelStats};
pub use store::CacheStore;
