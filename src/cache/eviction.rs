//! Eviction Policy Module
//!
//! Chooses which entry to drop when a cache is at capacity.
//!
//! Entries are kept in recency order:
//! - Front = Least recently used
//! - Back = Most recently used

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;
use crate::error::CacheError;

// == Eviction Policy ==
/// Victim selection strategy of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used
    #[default]
    Lru,
    /// Least frequently used, least recent on ties
    Lfu,
    /// Oldest insertion
    Fifo,
    /// Earliest expiry, least recent on ties
    Ttl,
}

impl EvictionPolicy {
    // == Select Victim ==
    /// Returns the index of the entry to evict, or None if there are no entries.
    ///
    /// `min_by_key` keeps the first minimum, so ties resolve to the least
    /// recently used entry.
    pub fn select_victim(&self, entries: &IndexMap<String, CacheEntry>) -> Option<usize> {
        if entries.is_empty() {
            return None;
        }

        let indexed = entries.values().enumerate();
        match self {
            EvictionPolicy::Lru => Some(0),
            EvictionPolicy::Lfu => indexed.min_by_key(|(_, e)| e.access_count).map(|(i, _)| i),
            EvictionPolicy::Fifo => indexed.min_by_key(|(_, e)| e.timestamp).map(|(i, _)| i),
            EvictionPolicy::Ttl => indexed.min_by_key(|(_, e)| e.expires_at()).map(|(i, _)| i),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::Fifo => "fifo",
            EvictionPolicy::Ttl => "ttl",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "fifo" => Ok(EvictionPolicy::Fifo),
            "ttl" => Ok(EvictionPolicy::Ttl),
            other => Err(CacheError::Config(format!(
                "Unknown eviction policy '{}'",
                other
            ))),
        }
    }
}
