//! Namespace Registry
//!
//! `CacheManager` is the context object consumers share: it owns the default
//! configuration, the durable storage medium, the encryption key and one
//! lazily created [`Cache`] per namespace.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::cache::{Cache, CacheStats, MultiLevelCache};
use crate::codec::EncryptionKey;
use crate::config::{CacheConfig, CacheOptions, Config};
use crate::error::Result;
use crate::memoize::Memoized;
use crate::storage::{FileStorage, MemoryStorage, Storage};

/// Prefix of every namespace snapshot key.
pub const NAMESPACE_KEY_PREFIX: &str = "cache:namespace:";

// == Cache Manager ==
#[derive(Debug)]
pub struct CacheManager {
    defaults: CacheConfig,
    storage: Arc<dyn Storage>,
    encryption_key: Option<EncryptionKey>,
    caches: RwLock<HashMap<String, Cache>>,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager {
    // == Constructor ==
    /// Creates a manager with default configuration and in-memory storage.
    pub fn new() -> Self {
        Self {
            defaults: CacheConfig::default(),
            storage: Arc::new(MemoryStorage::new()),
            encryption_key: None,
            caches: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a manager from process configuration.
    ///
    /// Uses file storage when `storage_dir` is set and parses the encryption key.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut manager = Self::new().with_defaults(config.defaults.clone());

        if let Some(dir) = &config.storage_dir {
            manager = manager.with_storage(Arc::new(FileStorage::new(dir)?));
        }
        if let Some(key) = &config.encryption_key {
            manager = manager.with_encryption_key(EncryptionKey::from_base64(key)?);
        }

        info!(
            max_size = manager.defaults.max_size,
            policy = %manager.defaults.eviction_policy,
            file_storage = config.storage_dir.is_some(),
            "Cache manager configured"
        );
        Ok(manager)
    }

    pub fn with_defaults(mut self, defaults: CacheConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_encryption_key(mut self, key: EncryptionKey) -> Self {
        self.encryption_key = Some(key);
        self
    }

    pub fn defaults(&self) -> &CacheConfig {
        &self.defaults
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Storage key of a namespace's snapshot: the namespace verbatim under
    /// [`NAMESPACE_KEY_PREFIX`]. Distinct namespaces never share a snapshot.
    pub fn storage_key(namespace: &str) -> String {
        format!("{NAMESPACE_KEY_PREFIX}{namespace}")
    }

    // == Cache ==
    /// Returns the namespace's cache, creating it with the defaults on first use.
    pub fn cache(&self, namespace: &str) -> Cache {
        self.cache_with(namespace, &CacheOptions::default())
    }

    /// Returns the namespace's cache, creating it with `options` merged over
    /// the defaults on first use. Options are ignored for an existing namespace.
    pub fn cache_with(&self, namespace: &str, options: &CacheOptions) -> Cache {
        if let Some(cache) = self.caches.read().get(namespace) {
            return cache.clone();
        }

        let mut caches = self.caches.write();
        caches
            .entry(namespace.to_string())
            .or_insert_with(|| {
                let config = options.merge_over(&self.defaults, Self::storage_key(namespace));
                info!(
                    namespace,
                    max_size = config.max_size,
                    persistent = config.persistent,
                    "Creating namespace cache"
                );
                Cache::open(
                    config,
                    Some(self.storage.clone()),
                    self.encryption_key.as_ref(),
                )
            })
            .clone()
    }

    /// Builds a two-tier cache on this manager's storage and key.
    pub fn multi_level(&self) -> MultiLevelCache {
        MultiLevelCache::new(Some(self.storage.clone()), self.encryption_key.as_ref())
    }

    /// Wraps `func` so its results are cached in the namespace's cache.
    pub fn memoize<F, A, Fut>(&self, namespace: &str, name: &str, func: F) -> Memoized<F>
    where
        F: Fn(A) -> Fut,
        Fut: Future,
    {
        Memoized::new(self.cache(namespace), name, func)
    }

    // == Clear ==
    /// Clears one namespace. Returns false if it was never created.
    pub async fn clear_namespace(&self, namespace: &str) -> bool {
        let cache = self.caches.read().get(namespace).cloned();
        match cache {
            Some(cache) => {
                cache.clear().await;
                true
            }
            None => false,
        }
    }

    pub async fn clear_all(&self) {
        for cache in self.registered() {
            cache.clear().await;
        }
    }

    /// Registered namespace names, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }

    // == Stats ==
    /// Stats of every registered cache keyed by namespace.
    pub async fn stats(&self) -> BTreeMap<String, CacheStats> {
        let caches: Vec<(String, Cache)> = self
            .caches
            .read()
            .iter()
            .map(|(name, cache)| (name.clone(), cache.clone()))
            .collect();

        let mut stats = BTreeMap::new();
        for (name, cache) in caches {
            stats.insert(name, cache.stats().await);
        }
        stats
    }

    // == Shutdown ==
    /// Forgets every namespace. Cleanup sweeps stop once outstanding handles are dropped.
    pub fn shutdown(&self) {
        let drained: Vec<Cache> = self.caches.write().drain().map(|(_, c)| c).collect();
        info!(namespaces = drained.len(), "Cache manager shut down");
    }

    fn registered(&self) -> Vec<Cache> {
        self.caches.read().values().cloned().collect()
    }
}
