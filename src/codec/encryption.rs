//! AES-256-GCM encryption stage.
//!
//! Stored layout is `nonce (12 bytes) || ciphertext+tag`.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;

use super::Transform;
use crate::error::{CacheError, Result};

/// Nonce size for AES-256-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits)
const KEY_SIZE: usize = 32;

// == Encryption Key ==
/// A 256-bit key for [`AesGcmEncryption`].
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Random key from the thread RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parses a base64 encoded 32 byte key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| CacheError::encryption(format!("Invalid base64 key: {e}")))?;

        if bytes.len() != KEY_SIZE {
            return Err(CacheError::encryption(format!(
                "Key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        Ok(Self(key))
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

// == AES-GCM Stage ==
/// Authenticated payload encryption with a random nonce per write.
#[derive(Clone)]
pub struct AesGcmEncryption {
    cipher: Aes256Gcm,
}

impl AesGcmEncryption {
    pub fn new(key: &EncryptionKey) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(&key.0);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }
}

impl fmt::Debug for AesGcmEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEncryption").finish_non_exhaustive()
    }
}

impl Transform for AesGcmEncryption {
    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }

    fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, input)
            .map_err(|e| CacheError::encryption(format!("Encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() < NONCE_SIZE {
            return Err(CacheError::encryption("Ciphertext shorter than nonce"));
        }

        let (nonce_bytes, ciphertext) = input.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CacheError::encryption(format!("Decryption failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let stage = AesGcmEncryption::new(&EncryptionKey::generate());

        let sealed = stage.encode(b"secret booking").unwrap();
        assert_ne!(&sealed[NONCE_SIZE..], b"secret booking");
        assert_eq!(stage.decode(&sealed).unwrap(), b"secret booking");
    }

    #[test]
    fn test_nonce_differs_per_write() {
        let stage = AesGcmEncryption::new(&EncryptionKey::generate());

        let first = stage.encode(b"same").unwrap();
        let second = stage.encode(b"same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let stage = AesGcmEncryption::new(&EncryptionKey::generate());

        let mut sealed = stage.encode(b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            stage.decode(&sealed),
            Err(CacheError::Encryption(_))
        ));
    }

    #[test]
    fn test_short_input_rejected() {
        let stage = AesGcmEncryption::new(&EncryptionKey::generate());
        assert!(stage.decode(&[0u8; 4]).is_err());
    }

    #[test]
    fn test_key_base64() {
        let key = EncryptionKey::new([7u8; KEY_SIZE]);
        let parsed = EncryptionKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(parsed, key);

        assert!(EncryptionKey::from_base64("c2hvcnQ=").is_err());
        assert!(EncryptionKey::from_base64("***").is_err());
        assert_eq!(format!("{:?}", key), "EncryptionKey(..)");
    }
}
