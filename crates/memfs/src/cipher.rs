// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Whole-buffer encryption at rest.
//!
//! Stored layout is `nonce (12 bytes) || AES-256-GCM ciphertext+tag`. The
//! user key may have any length; SHA-256 of it is the cipher key. An empty
//! buffer is stored as an empty buffer in both directions.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const NONCE_SIZE: usize = 12;

/// Encrypts and decrypts file contents. A cipher without a key passes data
/// through unchanged.
#[derive(Clone, Default)]
pub struct Cipher {
    aead: Option<Aes256Gcm>,
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl Cipher {
    /// Builds a cipher from a user secret. An empty secret disables it.
    #[must_use]
    pub fn new(key: &[u8]) -> Self {
        if key.is_empty() {
            return Self::disabled();
        }
        let digest = Sha256::digest(key);
        let key = Key::<Aes256Gcm>::from_slice(digest.as_slice());
        Self {
            aead: Some(Aes256Gcm::new(key)),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self { aead: None }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.aead.is_some()
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let Some(aead) = &self.aead else {
            return Ok(plaintext.to_vec());
        };
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let sealed = aead
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub fn decrypt(&self, stored: &[u8]) -> Result<Vec<u8>> {
        let Some(aead) = &self.aead else {
            return Ok(stored.to_vec());
        };
        if stored.is_empty() {
            return Ok(Vec::new());
        }
        if stored.len() < NONCE_SIZE {
            return Err(Error::decryption_failed("ciphertext too short"));
        }

        let (nonce, sealed) = stored.split_at(NONCE_SIZE);
        aead.decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| Error::decryption_failed("authentication failed (wrong key or corrupted data)"))
    }
}
