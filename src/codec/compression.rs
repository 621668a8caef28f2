//! Gzip compression stage.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::Transform;
use crate::error::{CacheError, Result};

/// Gzip payload compression backed by `flate2`.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompression {
    level: Compression,
}

impl GzipCompression {
    /// Compression level 0-9.
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for GzipCompression {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Transform for GzipCompression {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder
            .write_all(input)
            .map_err(|e| CacheError::codec(format!("Compression failed: {e}")))?;
        encoder
            .finish()
            .map_err(|e| CacheError::codec(format!("Compression failed: {e}")))
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(input);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CacheError::codec(format!("Decompression failed: {e}")))?;
        Ok(out)
    }
}
