//! Multi-Level Cache
//!
//! A small volatile tier in front of a larger persistent tier. Reads cascade
//! and promote durable hits into the fast tier; writes go to both tiers. Once
//! written, the tiers keep independent TTLs and recency.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{Cache, MultiLevelStats};
use crate::codec::EncryptionKey;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::storage::Storage;

/// Capacity of the default fast tier
pub const FAST_TIER_MAX_SIZE: usize = 100;

/// Default TTL of the fast tier
pub const FAST_TIER_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Capacity of the default durable tier
pub const DURABLE_TIER_MAX_SIZE: usize = 1000;

/// Default TTL of the durable tier
pub const DURABLE_TIER_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Storage key of the default durable tier
pub const DURABLE_TIER_STORAGE_KEY: &str = "cache:durable";

// == Multi-Level Cache ==
#[derive(Debug, Clone)]
pub struct MultiLevelCache {
    fast: Cache,
    durable: Cache,
}

impl MultiLevelCache {
    /// Builds the default tiers: a 100 entry volatile tier and a 1000 entry
    /// persistent tier stored under `cache:durable`.
    pub fn new(storage: Option<Arc<dyn Storage>>, key: Option<&EncryptionKey>) -> Self {
        let fast = CacheConfig::default()
            .with_max_size(FAST_TIER_MAX_SIZE)
            .with_max_age(FAST_TIER_MAX_AGE);
        let durable = CacheConfig::default()
            .with_max_size(DURABLE_TIER_MAX_SIZE)
            .with_max_age(DURABLE_TIER_MAX_AGE)
            .with_persistence(DURABLE_TIER_STORAGE_KEY);

        Self::with_tiers(Cache::new(fast), Cache::open(durable, storage, key))
    }

    pub fn with_tiers(fast: Cache, durable: Cache) -> Self {
        Self { fast, durable }
    }

    pub fn fast_tier(&self) -> &Cache {
        &self.fast
    }

    pub fn durable_tier(&self) -> &Cache {
        &self.durable
    }

    // == Get ==
    /// Looks in the fast tier, then the durable tier. A durable hit is
    /// copied into the fast tier with the fast tier's default TTL.
    pub async fn get<V: Serialize + DeserializeOwned>(&self, key: &str) -> Option<V> {
        if let Some(value) = self.fast.get(key).await {
            return Some(value);
        }

        let value: V = self.durable.get(key).await?;
        match self.fast.set(key, &value, None).await {
            Ok(()) => debug!(key, "Promoted entry to fast tier"),
            Err(e) => warn!(key, error = %e, "Failed to promote entry to fast tier"),
        }
        Some(value)
    }

    // == Set ==
    /// Writes through to both tiers.
    pub async fn set<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let fast = self.fast.set(key, value, ttl).await;
        let durable = self.durable.set(key, value, ttl).await;
        fast.and(durable)
    }

    pub async fn has(&self, key: &str) -> bool {
        self.fast.has(key).await || self.durable.has(key).await
    }

    /// Removes the key from both tiers; true if either held it.
    pub async fn delete(&self, key: &str) -> bool {
        let fast = self.fast.delete(key).await;
        let durable = self.durable.delete(key).await;
        fast || durable
    }

    pub async fn clear(&self) {
        self.fast.clear().await;
        self.durable.clear().await;
    }

    pub async fn stats(&self) -> MultiLevelStats {
        MultiLevelStats {
            fast_tier: self.fast.stats().await,
            durable_tier: self.durable.stats().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn cache() -> (MultiLevelCache, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let shared: Arc<dyn Storage> = storage.clone();
        (MultiLevelCache::new(Some(shared), None), storage)
    }

    #[tokio::test]
    async fn test_default_tiers() {
        let (cache, _) = cache();

        let fast = cache.fast_tier().config().await;
        assert_eq!(fast.max_size, FAST_TIER_MAX_SIZE);
        assert!(!fast.persistent);

        let durable = cache.durable_tier().config().await;
        assert_eq!(durable.max_size, DURABLE_TIER_MAX_SIZE);
        assert!(durable.persistent);
        assert_eq!(durable.storage_key, DURABLE_TIER_STORAGE_KEY);
    }

    #[tokio::test]
    async fn test_set_writes_both_tiers() {
        let (cache, storage) = cache();

        cache.set("k", "v", None).await.unwrap();

        assert!(cache.fast_tier().has("k").await);
        assert!(cache.durable_tier().has("k").await);
        assert!(storage.contains(DURABLE_TIER_STORAGE_KEY));
    }

    #[tokio::test]
    async fn test_durable_hit_promotes() {
        let (cache, _) = cache();

        cache.durable_tier().set("k", "v", None).await.unwrap();
        assert!(!cache.fast_tier().has("k").await);

        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));
        assert!(cache.fast_tier().has("k").await);

        let stats = cache.stats().await;
        assert_eq!(stats.fast_tier.misses, 1);
        assert_eq!(stats.durable_tier.hits, 1);
    }

    #[tokio::test]
    async fn test_fast_hit_skips_durable() {
        let (cache, _) = cache();

        cache.set("k", &1, None).await.unwrap();
        assert_eq!(cache.get::<i32>("k").await, Some(1));

        let stats = cache.stats().await;
        assert_eq!(stats.fast_tier.hits, 1);
        assert_eq!(stats.durable_tier.hits, 0);
        assert_eq!(stats.durable_tier.misses, 0);
    }

    #[tokio::test]
    async fn test_miss_in_both() {
        let (cache, _) = cache();
        assert_eq!(cache.get::<i32>("missing").await, None);
        assert!(!cache.has("missing").await);
    }

    #[tokio::test]
    async fn test_delete_either_tier() {
        let (cache, _) = cache();

        cache.durable_tier().set("k", &1, None).await.unwrap();
        assert!(cache.has("k").await);
        assert!(cache.delete("k").await);
        assert!(!cache.has("k").await);
        assert!(!cache.delete("k").await);
    }

    #[tokio::test]
    async fn test_clear_both_tiers() {
        let (cache, storage) = cache();

        cache.set("a", &1, None).await.unwrap();
        cache.set("b", &2, None).await.unwrap();
        cache.clear().await;

        assert!(cache.fast_tier().is_empty().await);
        assert!(cache.durable_tier().is_empty().await);
        assert!(!storage.contains(DURABLE_TIER_STORAGE_KEY));
    }

    #[tokio::test]
    async fn test_durable_tier_survives_restart() {
        let (cache, storage) = cache();
        cache.set("k", "v", None).await.unwrap();
        drop(cache);

        let shared: Arc<dyn Storage> = storage;
        let reopened = MultiLevelCache::new(Some(shared), None);
        assert!(!reopened.fast_tier().has("k").await);
        assert_eq!(reopened.get::<String>("k").await.as_deref(), Some("v"));
        assert!(reopened.fast_tier().has("k").await);
    }
}
