//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// Represents a single cache entry with its encoded payload and bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Key the entry is stored under
    pub key: String,
    /// Payload after the serialize pipeline (possibly compressed/encrypted)
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    /// Creation timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Time to live in milliseconds, relative to `timestamp`
    pub ttl: u64,
    /// Number of successful reads
    pub access_count: u64,
    /// Timestamp of the most recent successful read (Unix milliseconds)
    pub last_accessed: u64,
    /// Estimated size of the payload in bytes
    pub size: usize,
    /// Free-form extension data, unused by the engine
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    ///
    /// # Arguments
    /// * `key` - The key the entry belongs to
    /// * `value` - The encoded payload
    /// * `ttl` - Lifetime of the entry
    pub fn new(key: String, value: Vec<u8>, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        let size = estimate_size(&key, &value);

        Self {
            key,
            value,
            timestamp: now,
            ttl: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            access_count: 0,
            last_accessed: now,
            size,
            metadata: HashMap::new(),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// An entry is expired once its age is strictly greater than its TTL.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) > self.ttl
    }

    /// Instant (Unix milliseconds) after which the entry is expired.
    pub fn expires_at(&self) -> u64 {
        self.timestamp.saturating_add(self.ttl)
    }

    // == Record Access ==
    /// Bumps the access counter and read timestamp.
    pub fn record_access(&mut self, now: u64) {
        self.access_count += 1;
        self.last_accessed = now;
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        let remaining = self.expires_at().saturating_sub(current_timestamp_ms());
        Duration::from_millis(remaining)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Rough byte footprint of an entry, for reporting only.
fn estimate_size(key: &str, value: &[u8]) -> usize {
    key.len() + value.len()
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn entry(ttl_ms: u64) -> CacheEntry {
        CacheEntry::new(
            "key".to_string(),
            b"value".to_vec(),
            Duration::from_millis(ttl_ms),
        )
    }

    #[test]
    fn test_entry_creation() {
        let entry = entry(60_000);

        assert_eq!(entry.key, "key");
        assert_eq!(entry.value, b"value");
        assert_eq!(entry.ttl, 60_000);
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.size, 8);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = entry(50);

        assert!(!entry.is_expired());

        sleep(Duration::from_millis(80));

        assert!(entry.is_expired());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = entry(100);

        // Age equal to the TTL is still live; one past it is expired
        assert!(!entry.is_expired_at(entry.timestamp + 100));
        assert!(entry.is_expired_at(entry.timestamp + 101));
    }

    #[test]
    fn test_clock_skew_is_not_expiry() {
        let entry = entry(100);
        assert!(!entry.is_expired_at(entry.timestamp.saturating_sub(5_000)));
    }

    #[test]
    fn test_record_access() {
        let mut entry = entry(1_000);
        entry.record_access(entry.timestamp + 10);
        entry.record_access(entry.timestamp + 20);

        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed, entry.timestamp + 20);
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = entry(10_000);

        let remaining = entry.ttl_remaining();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining >= Duration::from_secs(9));
    }

    #[test]
    fn test_ttl_remaining_expired() {
        let entry = entry(10);
        sleep(Duration::from_millis(30));
        assert_eq!(entry.ttl_remaining(), Duration::ZERO);
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = entry(1_000);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["key"], "key");
        assert_eq!(json["value"], "dmFsdWU=");
        assert!(json.get("accessCount").is_some());
        assert!(json.get("metadata").is_none());

        let back: CacheEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.value, b"value");
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new("k".to_string(), Vec::new(), Duration::MAX);

        assert_eq!(entry.ttl, u64::MAX);
        assert_eq!(entry.expires_at(), u64::MAX);
        assert!(!entry.is_expired());
    }
}
