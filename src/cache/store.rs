//! Cache Store Module
//!
//! Main cache engine combining an ordered entry map with eviction, TTL
//! expiration, the serialize pipeline and snapshot persistence.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheStats, Counters};
use crate::codec::{EncryptionKey, Pipeline};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::storage::Storage;

// == Cache Store ==
/// Single-tier cache with bounded entry count.
///
/// Entries are kept in recency order (front = least recently used). Reads
/// move an entry to the back; writes delete then re-insert at the back.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-entry storage in recency order
    entries: IndexMap<String, CacheEntry>,
    /// Performance counters
    counters: Counters,
    /// Capacity, TTL and pipeline settings
    config: CacheConfig,
    /// Payload encoding
    pipeline: Pipeline,
    /// Snapshot medium, used only when `config.persistent`
    storage: Option<Arc<dyn Storage>>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a volatile CacheStore from a configuration.
    ///
    /// `persistent` has no effect without storage; see [`CacheStore::open`].
    pub fn new(config: CacheConfig) -> Self {
        Self::open(config, None, None)
    }

    /// Creates a CacheStore and restores its snapshot if it is persistent.
    ///
    /// # Arguments
    /// * `config` - Capacity, TTL, policy and pipeline flags
    /// * `storage` - Durable medium for the snapshot
    /// * `key` - Key for the encryption stage, if enabled
    pub fn open(
        config: CacheConfig,
        storage: Option<Arc<dyn Storage>>,
        key: Option<&EncryptionKey>,
    ) -> Self {
        if config.persistent && storage.is_none() {
            warn!(
                storage_key = %config.storage_key,
                "Persistent cache has no storage, running in memory only"
            );
        }

        let pipeline = Pipeline::from_config(&config, key);
        let mut store = Self {
            entries: IndexMap::new(),
            counters: Counters::new(),
            config,
            pipeline,
            storage,
        };
        store.restore();
        store
    }

    // == Set ==
    /// Stores a value with optional TTL.
    ///
    /// An existing entry for the key is removed first, so the new entry is
    /// most recently used. While the cache is at capacity, one victim at a
    /// time is evicted according to the eviction policy.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL (uses `max_age` if None)
    pub fn set<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let payload = self.pipeline.serialize(value)?;

        self.entries.shift_remove(key);

        if self.config.max_size == 0 {
            debug!(key, "Cache has zero capacity, value not stored");
            self.persist();
            return Ok(());
        }

        while self.entries.len() >= self.config.max_size {
            self.evict_one();
        }

        let entry = CacheEntry::new(
            key.to_string(),
            payload,
            ttl.unwrap_or(self.config.max_age),
        );
        self.entries.insert(key.to_string(), entry);

        self.persist();
        Ok(())
    }

    // == Set If Absent ==
    /// Stores a value only if no live entry exists for the key.
    ///
    /// Returns whether the value was stored.
    pub fn set_if_absent<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        if self.has(key) {
            return Ok(false);
        }
        self.set(key, value, ttl)?;
        Ok(true)
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns the value if found and not expired. Expired entries are
    /// removed and counted as misses. A payload that cannot be decoded as `V`
    /// is dropped and counted as a miss.
    ///
    /// # Arguments
    /// * `key` - The key to retrieve
    pub fn get<V: DeserializeOwned>(&mut self, key: &str) -> Option<V> {
        let now = current_timestamp_ms();

        let Some(index) = self.entries.get_index_of(key) else {
            self.counters.record_miss();
            return None;
        };

        let decoded = match self.entries.get_index(index) {
            Some((_, entry)) if entry.is_expired_at(now) => {
                debug!(key, "Entry expired on read");
                None
            }
            Some((_, entry)) => match self.pipeline.deserialize::<V>(&entry.value) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "Dropping entry that failed to decode");
                    None
                }
            },
            None => None,
        };

        let Some(value) = decoded else {
            self.entries.shift_remove_index(index);
            self.counters.record_miss();
            return None;
        };

        if let Some((_, entry)) = self.entries.get_index_mut(index) {
            entry.record_access(now);
        }
        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        self.counters.record_hit();

        Some(value)
    }

    // == Has ==
    /// True if the key is present and not expired. Does not touch recency or counters.
    pub fn has(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Delete ==
    /// Removes an entry by key.
    ///
    /// Returns whether an entry was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.shift_remove(key).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    // == Remove Where ==
    /// Removes every entry whose key matches the predicate.
    ///
    /// Returns the number of entries removed. The snapshot is written once.
    pub fn remove_where<P: Fn(&str) -> bool>(&mut self, predicate: P) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !predicate(key));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    // == Clear ==
    /// Removes every entry and erases the durable snapshot.
    pub fn clear(&mut self) {
        self.entries.clear();

        if let Some(storage) = self.durable() {
            if let Err(e) = storage.remove(&self.config.storage_key) {
                warn!(
                    storage_key = %self.config.storage_key,
                    error = %e,
                    "Failed to erase cache snapshot"
                );
            }
        }
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let total_size = self.entries.values().map(|e| e.size).sum();
        CacheStats::new(
            &self.counters,
            self.entries.len(),
            self.config.max_size,
            total_size,
        )
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let count = before - self.entries.len();

        if count > 0 {
            self.persist();
        }
        count
    }

    // == Keys ==
    /// Returns all stored keys, least recently used first.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Remaining lifetime of a live entry.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(CacheEntry::ttl_remaining)
    }

    /// Bookkeeping of a stored entry, without touching recency.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_one(&mut self) {
        let Some(index) = self.config.eviction_policy.select_victim(&self.entries) else {
            return;
        };
        if let Some((key, _)) = self.entries.shift_remove_index(index) {
            self.counters.record_eviction();
            debug!(
                key = %key,
                policy = %self.config.eviction_policy,
                "Evicted entry"
            );
        }
    }

    fn durable(&self) -> Option<&Arc<dyn Storage>> {
        if self.config.persistent {
            self.storage.as_ref()
        } else {
            None
        }
    }

    // == Persistence ==
    /// Writes the full entry set to storage. Failures are logged only.
    fn persist(&self) {
        let Some(storage) = self.durable() else {
            return;
        };

        let snapshot: Vec<&CacheEntry> = self.entries.values().collect();
        let result = serde_json::to_vec(&snapshot)
            .map_err(CacheError::from)
            .and_then(|bytes| storage.write(&self.config.storage_key, &bytes));

        if let Err(e) = result {
            warn!(
                storage_key = %self.config.storage_key,
                error = %e,
                "Failed to persist cache snapshot"
            );
        }
    }

    /// Loads the snapshot, dropping expired and undecodable entries.
    fn restore(&mut self) {
        let Some(storage) = self.durable() else {
            return;
        };

        let bytes = match storage.read(&self.config.storage_key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                warn!(
                    storage_key = %self.config.storage_key,
                    error = %e,
                    "Failed to read cache snapshot"
                );
                return;
            }
        };

        let snapshot: Vec<CacheEntry> = match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    storage_key = %self.config.storage_key,
                    error = %e,
                    "Ignoring unreadable cache snapshot"
                );
                return;
            }
        };

        let now = current_timestamp_ms();
        let total = snapshot.len();
        for entry in snapshot {
            if entry.is_expired_at(now) || self.pipeline.unwrap_payload(&entry.value).is_err() {
                continue;
            }
            self.entries.insert(entry.key.clone(), entry);
        }

        while self.entries.len() > self.config.max_size {
            let Some(index) = self.config.eviction_policy.select_victim(&self.entries) else {
                break;
            };
            self.entries.shift_remove_index(index);
        }

        info!(
            storage_key = %self.config.storage_key,
            restored = self.entries.len(),
            dropped = total - self.entries.len(),
            "Restored cache snapshot"
        );
    }
}
