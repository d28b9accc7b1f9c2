//! Nomos cryptographic primitives.
//!
//! Stakes are sealed with XChaCha20-Poly1305 under a per-commitment 256-bit
//! key. The engine is stateless and never creates keys; key custody and
//! generation belong to the key vault.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod cipher;
mod error;
mod key;

pub use cipher::CipherEngine;
pub use error::{CryptoError, CryptoResult};
pub use key::SymmetricKey;

/// Size of a stake key in bytes (256-bit).
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit).
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag.
pub const TAG_SIZE: usize = 16;

/// Leading byte of every sealed envelope.
pub const ENVELOPE_VERSION: u8 = 0x01;
