// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection-config encryption.
//!
//! With a key configured, blobs are AES-256-GCM: a fresh random 12-byte
//! nonce prepended to the ciphertext, key derived from the configured
//! string via SHA-256. Without a key, blobs are plain JSON. The mode comes
//! from configuration, never from sniffing the payload.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};
use skiff_core::{Classify, ConfigMap, ErrorKind};
use thiserror::Error;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("ciphertext too short")]
    Truncated,
    #[error("decryption failed (wrong key or corrupt blob)")]
    Decrypt,
    #[error("encryption failed")]
    Encrypt,
    #[error("config blob is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Classify for CredentialError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Encrypts and decrypts connection config maps.
#[derive(Clone)]
pub struct CredentialCipher {
    key: Option<Key<Aes256Gcm>>,
}

impl CredentialCipher {
    /// `key` empty or `None` selects plaintext passthrough.
    pub fn new(key: Option<&str>) -> Self {
        let key = key.filter(|k| !k.is_empty()).map(|k| {
            let digest = Sha256::digest(k.as_bytes());
            Key::<Aes256Gcm>::from(<[u8; 32]>::from(digest))
        });
        Self { key }
    }

    pub fn is_encrypting(&self) -> bool {
        self.key.is_some()
    }

    pub fn encrypt(&self, config: &ConfigMap) -> Result<Vec<u8>, CredentialError> {
        let plaintext = serde_json::to_vec(config)?;
        let Some(key) = &self.key else {
            return Ok(plaintext);
        };
        let cipher = Aes256Gcm::new(key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext =
            cipher.encrypt(&nonce, plaintext.as_slice()).map_err(|_| CredentialError::Encrypt)?;
        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    pub fn decrypt(&self, blob: &[u8]) -> Result<ConfigMap, CredentialError> {
        let Some(key) = &self.key else {
            return Ok(serde_json::from_slice(blob)?);
        };
        if blob.len() < NONCE_LEN {
            return Err(CredentialError::Truncated);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CredentialError::Decrypt)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
