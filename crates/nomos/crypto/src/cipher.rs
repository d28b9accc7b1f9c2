//! Authenticated sealing of opaque stake bytes.
//!
//! Envelope layout:
//!
//! ```text
//! +---------+----------------+-------------------------------+
//! | version | nonce (24 B)   | ciphertext || tag (16 B)      |
//! +---------+----------------+-------------------------------+
//! ```

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::key::SymmetricKey;
use crate::{ENVELOPE_VERSION, NONCE_SIZE, TAG_SIZE};

const HEADER_SIZE: usize = 1 + NONCE_SIZE;

/// Stateless XChaCha20-Poly1305 engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct CipherEngine;

impl CipherEngine {
    pub fn new() -> Self {
        Self
    }

    /// Seal `plaintext` under `key` with a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8], key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
        self.seal_bound(plaintext, key, &[])
    }

    /// Open an envelope produced by [`CipherEngine::seal`].
    pub fn open(&self, envelope: &[u8], key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
        self.open_bound(envelope, key, &[])
    }

    /// Seal with associated data. The same bytes must be presented to
    /// [`CipherEngine::open_bound`].
    pub fn seal_bound(
        &self,
        plaintext: &[u8],
        key: &SymmetricKey,
        associated_data: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| CryptoError::CryptoFailure(format!("nonce generation: {e}")))?;

        let sealed = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|_| CryptoError::CryptoFailure("encryption failed".to_string()))?;

        let mut envelope = Vec::with_capacity(HEADER_SIZE + sealed.len());
        envelope.push(ENVELOPE_VERSION);
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&sealed);
        Ok(envelope)
    }

    pub fn open_bound(
        &self,
        envelope: &[u8],
        key: &SymmetricKey,
        associated_data: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        if envelope.len() < HEADER_SIZE + TAG_SIZE || envelope[0] != ENVELOPE_VERSION {
            return Err(CryptoError::AuthenticationFailure);
        }
        let (nonce, sealed) = envelope[1..].split_at(NONCE_SIZE);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: associated_data,
                },
            )
            .map_err(|_| CryptoError::AuthenticationFailure)
    }
}
