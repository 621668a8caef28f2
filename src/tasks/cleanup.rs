//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Shortest pause between two sweeps; shorter intervals are raised to it.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(10);

/// Spawns a background task that periodically cleans up expired cache entries.
///
/// The task runs in a loop, sleeping for the specified interval between
/// cleanup runs. It acquires the same write lock as foreground operations to
/// remove expired entries. It holds only a weak reference and exits once the
/// cache has been dropped.
///
/// # Arguments
/// * `cache` - Weak reference to the shared cache store
/// * `interval` - Time between cleanup runs, at least [`MIN_CLEANUP_INTERVAL`]
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task.
pub fn spawn_cleanup_task(cache: Weak<RwLock<CacheStore>>, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(MIN_CLEANUP_INTERVAL);

    tokio::spawn(async move {
        debug!(
            "Starting TTL cleanup task with interval of {} ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, stopping TTL cleanup task");
                break;
            };

            let (removed, storage_key) = {
                let mut cache_guard = cache.write().await;
                let removed = cache_guard.cleanup_expired();
                (removed, cache_guard.config().storage_key.clone())
            };

            if removed > 0 {
                info!(
                    storage_key = %storage_key,
                    "TTL cleanup: removed {} expired entries", removed
                );
            } else {
                debug!(storage_key = %storage_key, "TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use std::sync::Arc;

    fn shared_store() -> Arc<RwLock<CacheStore>> {
        Arc::new(RwLock::new(CacheStore::new(CacheConfig::default())))
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache = shared_store();

        cache
            .write()
            .await
            .set("expire_soon", "value", Some(Duration::from_millis(50)))
            .unwrap();

        let handle = spawn_cleanup_task(Arc::downgrade(&cache), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(350)).await;

        // Removed by the sweep, not by a lazy read
        assert_eq!(cache.read().await.len(), 0);
        assert_eq!(cache.read().await.stats().misses, 0);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let cache = shared_store();

        cache
            .write()
            .await
            .set("long_lived", "value", Some(Duration::from_secs(3600)))
            .unwrap();

        let handle = spawn_cleanup_task(Arc::downgrade(&cache), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(200)).await;

        let value: Option<String> = cache.write().await.get("long_lived");
        assert_eq!(value.as_deref(), Some("value"));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_when_cache_dropped() {
        let cache = shared_store();

        let handle = spawn_cleanup_task(Arc::downgrade(&cache), Duration::from_millis(20));
        drop(cache);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(handle.is_finished(), "Task should exit once the cache is gone");
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let cache = shared_store();

        let handle = spawn_cleanup_task(Arc::downgrade(&cache), Duration::from_secs(1));

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }

    #[tokio::test]
    async fn test_zero_interval_is_raised_to_minimum() {
        let cache = shared_store();

        cache
            .write()
            .await
            .set("expire_soon", "value", Some(Duration::from_millis(20)))
            .unwrap();

        let handle = spawn_cleanup_task(Arc::downgrade(&cache), Duration::ZERO);

        // Foreground writes still get the lock between sweeps
        for i in 0..50 {
            cache
                .write()
                .await
                .set(&format!("k{i}"), &i, None)
                .unwrap();
            tokio::task::yield_now().await;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        let store = cache.read().await;
        assert!(!store.keys().contains(&"expire_soon".to_string()));
        assert_eq!(store.len(), 50);
        drop(store);

        handle.abort();
    }
}
