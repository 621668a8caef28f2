//! Serialize Pipeline
//!
//! Turns values into the byte payload stored in a cache entry and back:
//! value -> JSON -> compress (optional) -> encrypt (optional).
//! Decoding runs the stages in reverse order.

mod compression;
mod encryption;

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::config::CacheConfig;
use crate::error::Result;

pub use compression::GzipCompression;
pub use encryption::{AesGcmEncryption, EncryptionKey};

// == Transform ==
/// A reversible byte transform applied to stored payloads.
pub trait Transform: Send + Sync + fmt::Debug {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>>;

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;
}

// == Pipeline ==
/// Ordered list of transforms between a value and its stored bytes.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Transform>>,
}

impl Pipeline {
    /// A pipeline that only does JSON encoding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the pipeline selected by the `compression`/`encryption` flags.
    ///
    /// When encryption is enabled without a key, a random key is generated for
    /// the lifetime of this pipeline; snapshots written with it cannot be read
    /// back by another process.
    pub fn from_config(config: &CacheConfig, key: Option<&EncryptionKey>) -> Self {
        let mut pipeline = Self::new();

        if config.compression {
            pipeline = pipeline.with_stage(Arc::new(GzipCompression::default()));
        }

        if config.encryption {
            let key = match key {
                Some(key) => key.clone(),
                None => {
                    warn!(
                        storage_key = %config.storage_key,
                        "Encryption enabled without a key, using an ephemeral key"
                    );
                    EncryptionKey::generate()
                }
            };
            pipeline = pipeline.with_stage(Arc::new(AesGcmEncryption::new(&key)));
        }

        pipeline
    }

    /// Appends a stage; stages encode in insertion order.
    pub fn with_stage(mut self, stage: Arc<dyn Transform>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    // == Serialize ==
    pub fn serialize<V: Serialize + ?Sized>(&self, value: &V) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec(value)?;
        for stage in &self.stages {
            bytes = stage.encode(&bytes)?;
        }
        Ok(bytes)
    }

    // == Deserialize ==
    pub fn deserialize<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V> {
        let json = self.unwrap_payload(bytes)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Runs the decode stages only, returning the JSON bytes.
    pub fn unwrap_payload(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut buf = bytes.to_vec();
        for stage in self.stages.iter().rev() {
            buf = stage.decode(&buf)?;
        }
        Ok(buf)
    }
}
