//! Tiered Cache - an in-process caching layer
//!
//! Provides single-tier caches with policy-driven eviction and TTL
//! expiration, a two-tier fast/durable composite cache, a namespace
//! registry, memoization and bulk warm-up helpers.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod memoize;
pub mod registry;
pub mod storage;
pub mod tasks;
pub mod utils;

pub use cache::{Cache, CacheStats, CacheStore, EvictionPolicy, MultiLevelCache, MultiLevelStats};
pub use codec::EncryptionKey;
pub use config::{CacheConfig, CacheOptions, Config};
pub use error::{CacheError, Result};
pub use memoize::Memoized;
pub use registry::CacheManager;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use tasks::spawn_cleanup_task;
pub use utils::{generate_key, invalidate_pattern, normalize_key, warm_up, WarmUpEntry, WarmUpReport};
