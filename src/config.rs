//! Configuration Module
//!
//! Per-cache configuration (`CacheConfig`), its partial override form
//! (`CacheOptions`) and process-level settings loaded from environment
//! variables (`Config`).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::EvictionPolicy;

/// Storage key used by a cache that was not given one.
pub const DEFAULT_STORAGE_KEY: &str = "cache:default";

// == Cache Config ==
/// Configuration of a single-tier cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of entries (not bytes)
    pub max_size: usize,
    /// TTL applied when `set` is called without one
    pub max_age: Duration,
    /// Victim selection when the cache is full
    pub eviction_policy: EvictionPolicy,
    /// Write the full entry set to durable storage after each mutation
    pub persistent: bool,
    /// Gzip stored payloads
    pub compression: bool,
    /// AES-256-GCM stored payloads
    pub encryption: bool,
    /// Key under which the snapshot is stored
    pub storage_key: String,
    /// Interval of the background expiry sweep
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            max_age: Duration::from_secs(30 * 60),
            eviction_policy: EvictionPolicy::Lru,
            persistent: false,
            compression: false,
            encryption: false,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn with_persistence(mut self, storage_key: impl Into<String>) -> Self {
        self.persistent = true;
        self.storage_key = storage_key.into();
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.encryption = enabled;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

// == Cache Options ==
/// Partial cache configuration. Unset fields fall back to the defaults it is
/// merged over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheOptions {
    pub max_size: Option<usize>,
    pub max_age: Option<Duration>,
    pub eviction_policy: Option<EvictionPolicy>,
    pub persistent: Option<bool>,
    pub compression: Option<bool>,
    pub encryption: Option<bool>,
    pub cleanup_interval: Option<Duration>,
}

impl CacheOptions {
    /// Overlays these options on `defaults`, storing the snapshot under `storage_key`.
    pub fn merge_over(&self, defaults: &CacheConfig, storage_key: String) -> CacheConfig {
        CacheConfig {
            max_size: self.max_size.unwrap_or(defaults.max_size),
            max_age: self.max_age.unwrap_or(defaults.max_age),
            eviction_policy: self.eviction_policy.unwrap_or(defaults.eviction_policy),
            persistent: self.persistent.unwrap_or(defaults.persistent),
            compression: self.compression.unwrap_or(defaults.compression),
            encryption: self.encryption.unwrap_or(defaults.encryption),
            storage_key,
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
        }
    }
}

// == Process Config ==
/// Process-level settings for a [`CacheManager`](crate::CacheManager).
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Defaults applied to every namespace
    pub defaults: CacheConfig,
    /// Directory for file-backed durable storage; in-memory storage when unset
    pub storage_dir: Option<PathBuf>,
    /// Base64 AES-256 key for encrypted caches
    pub encryption_key: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum entries per cache (default: 1000)
    /// - `CACHE_MAX_AGE_SECS` - Default TTL in seconds (default: 1800)
    /// - `CACHE_EVICTION_POLICY` - `lru`, `lfu`, `fifo` or `ttl` (default: lru)
    /// - `CACHE_CLEANUP_INTERVAL_SECS` - Sweep frequency in seconds, zero means default (default: 60)
    /// - `CACHE_STORAGE_DIR` - Directory for durable snapshots (default: none)
    /// - `CACHE_ENCRYPTION_KEY` - Base64 encoded 32 byte key (default: none)
    pub fn from_env() -> Self {
        let base = CacheConfig::default();
        let defaults = CacheConfig {
            max_size: env::var("CACHE_MAX_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.max_size),
            max_age: env::var("CACHE_MAX_AGE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(base.max_age),
            eviction_policy: env::var("CACHE_EVICTION_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.eviction_policy),
            cleanup_interval: env::var("CACHE_CLEANUP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&secs: &u64| secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(base.cleanup_interval),
            ..base
        };

        Self {
            defaults,
            storage_dir: env::var("CACHE_STORAGE_DIR").ok().map(PathBuf::from),
            encryption_key: env::var("CACHE_ENCRYPTION_KEY").ok(),
        }
    }
}
