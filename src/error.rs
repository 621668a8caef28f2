//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.
//!
//! A cache miss is never an error: lookups return `Option`. The variants below
//! describe failures of the storage medium and of the serialize pipeline.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Durable storage rejected a read, write or remove
    #[error("Storage error: {0}")]
    Storage(String),

    /// Compression or decompression failed
    #[error("Codec error: {0}")]
    Codec(String),

    /// Encryption or decryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A value or snapshot could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub fn encryption(msg: impl Into<String>) -> Self {
        Self::Encryption(msg.into())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
