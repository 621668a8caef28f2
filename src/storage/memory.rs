//! In-process storage medium.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::Storage;
use crate::error::Result;

/// Storage backed by a map in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.read().contains_key(key)
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.blobs.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());
        assert_eq!(storage.read("missing").unwrap(), None);

        storage.write("cache:a", b"[1,2]").unwrap();
        assert_eq!(storage.read("cache:a").unwrap(), Some(b"[1,2]".to_vec()));
        assert!(storage.contains("cache:a"));

        storage.write("cache:a", b"[]").unwrap();
        assert_eq!(storage.read("cache:a").unwrap(), Some(b"[]".to_vec()));
        assert_eq!(storage.len(), 1);

        storage.remove("cache:a").unwrap();
        storage.remove("cache:a").unwrap();
        assert!(storage.is_empty());
    }
}
