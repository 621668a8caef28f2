//! Durable Storage
//!
//! The medium a persistent cache writes its snapshot to. A cache stores its
//! whole entry set as one blob under a single storage key.

mod file;
mod memory;

use std::fmt;

use crate::error::Result;

pub use file::FileStorage;
pub use memory::MemoryStorage;

// == Storage ==
/// Byte-oriented key-value medium.
///
/// Errors are reported to the cache, which logs them and keeps running with
/// its in-memory state.
pub trait Storage: Send + Sync + fmt::Debug {
    /// Returns the blob stored under `key`, or None if there is none.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the blob stored under `key`.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Removes `key`; removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
