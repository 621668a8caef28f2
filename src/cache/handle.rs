//! Shared Cache Handle
//!
//! Cloneable async handle over a [`CacheStore`]. Every operation holds the
//! store lock for its whole critical section, so eviction and the
//! delete-then-insert of an overwrite never interleave with another call.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheStats, CacheStore};
use crate::codec::EncryptionKey;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::storage::Storage;
use crate::tasks::spawn_cleanup_task;

/// Aborts the cleanup task when the last handle goes away.
#[derive(Debug)]
struct CleanupGuard(JoinHandle<()>);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// == Cache ==
/// Thread-safe single-tier cache.
#[derive(Debug, Clone)]
pub struct Cache {
    store: Arc<RwLock<CacheStore>>,
    _cleanup: Option<Arc<CleanupGuard>>,
}

impl Cache {
    // == Constructor ==
    /// Creates a volatile cache.
    pub fn new(config: CacheConfig) -> Self {
        Self::from_store(CacheStore::new(config))
    }

    /// Creates a cache, restoring its snapshot if it is persistent.
    pub fn open(
        config: CacheConfig,
        storage: Option<Arc<dyn Storage>>,
        key: Option<&EncryptionKey>,
    ) -> Self {
        Self::from_store(CacheStore::open(config, storage, key))
    }

    /// Wraps a store and starts its cleanup sweep.
    ///
    /// The sweep needs a tokio runtime; outside of one the cache relies on
    /// lazy expiry only.
    pub fn from_store(store: CacheStore) -> Self {
        let interval = store.config().cleanup_interval;
        let storage_key = store.config().storage_key.clone();
        let store = Arc::new(RwLock::new(store));

        let cleanup = match Handle::try_current() {
            Ok(_) => {
                let handle = spawn_cleanup_task(Arc::downgrade(&store), interval);
                Some(Arc::new(CleanupGuard(handle)))
            }
            Err(_) => {
                debug!(storage_key = %storage_key, "No tokio runtime, cleanup sweep disabled");
                None
            }
        };

        info!(storage_key = %storage_key, "Cache opened");
        Self {
            store,
            _cleanup: cleanup,
        }
    }

    // == Get ==
    /// Retrieves a live value, refreshing its recency.
    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.store.write().await.get(key)
    }

    // == Set ==
    /// Stores a value; `ttl` defaults to the configured `max_age`.
    pub async fn set<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.store.write().await.set(key, value, ttl)
    }

    /// Stores a value unless a live entry exists. Returns whether it was stored.
    pub async fn set_if_absent<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        self.store.write().await.set_if_absent(key, value, ttl)
    }

    pub async fn has(&self, key: &str) -> bool {
        self.store.read().await.has(key)
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.write().await.delete(key)
    }

    /// Removes every entry whose key matches the predicate.
    pub async fn remove_where<P: Fn(&str) -> bool>(&self, predicate: P) -> usize {
        self.store.write().await.remove_where(predicate)
    }

    pub async fn clear(&self) {
        self.store.write().await.clear()
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    /// Runs an expiry sweep now. Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        self.store.write().await.cleanup_expired()
    }

    /// Stored keys, least recently used first.
    pub async fn keys(&self) -> Vec<String> {
        self.store.read().await.keys()
    }

    pub async fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.store.read().await.ttl_remaining(key)
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    pub async fn config(&self) -> CacheConfig {
        self.store.read().await.config().clone()
    }

    /// True if both handles share the same store.
    pub fn same_cache(&self, other: &Cache) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_handle_basic_operations() {
        let cache = Cache::new(CacheConfig::default().with_max_size(10));

        cache.set("k", &42u32, None).await.unwrap();
        assert!(cache.has("k").await);
        assert_eq!(cache.get::<u32>("k").await, Some(42));
        assert_eq!(cache.len().await, 1);

        assert!(cache.delete("k").await);
        assert!(!cache.delete("k").await);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cache = Cache::new(CacheConfig::default());
        let other = cache.clone();

        cache.set("k", "v", None).await.unwrap();
        assert_eq!(other.get::<String>("k").await.as_deref(), Some("v"));
        assert!(cache.same_cache(&other));
        assert!(!cache.same_cache(&Cache::new(CacheConfig::default())));
    }

    #[tokio::test]
    async fn test_background_sweep_expires_entries() {
        let config = CacheConfig::default().with_cleanup_interval(Duration::from_millis(50));
        let cache = Cache::new(config);

        cache
            .set("k", "v", Some(Duration::from_millis(30)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.stats().await.misses, 0);
    }

    #[tokio::test]
    async fn test_sweep_rewrites_snapshot() {
        let storage = Arc::new(MemoryStorage::new());
        let shared: Arc<dyn Storage> = storage.clone();
        let config = CacheConfig::default()
            .with_persistence("cache:sweep")
            .with_cleanup_interval(Duration::from_millis(50));

        let cache = Cache::open(config, Some(shared), None);
        cache
            .set("short", &1, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        cache.set("long", &2, None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = storage.read("cache:sweep").unwrap().unwrap();
        let entries: Vec<serde_json::Value> = serde_json::from_slice(&snapshot).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["key"], "long");
    }

    #[tokio::test]
    async fn test_concurrent_writers_respect_capacity() {
        let cache = Cache::new(CacheConfig::default().with_max_size(16));

        let mut handles = Vec::new();
        for worker in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let key = format!("w{worker}:{i}");
                    cache.set(&key, &i, None).await.unwrap();
                    cache.get::<i32>(&key).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = cache.stats().await;
        assert_eq!(stats.size, 16);
        assert_eq!(stats.evictions, 8 * 50 - 16);
    }

    #[test]
    fn test_cache_without_runtime() {
        let cache = Cache::new(CacheConfig::default());
        tokio_test::block_on(async {
            cache.set("k", &1, None).await.unwrap();
            assert_eq!(cache.get::<i32>("k").await, Some(1));
        });
    }
}
