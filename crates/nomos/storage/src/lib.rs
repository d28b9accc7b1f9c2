//! Nomos storage.
//!
//! Three stores, all addressed by [`CommitmentId`](nomos_types::CommitmentId):
//! - [`KeyVault`]: per-commitment stake keys (secret)
//! - [`StakeStore`]: sealed stake envelopes (inert without the key)
//! - [`CommitmentStore`]: plain commitment metadata
//!
//! Each has an in-memory and a filesystem backend. With the `os-keyring`
//! feature, keys can live in the platform secret service instead.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod fs;
#[cfg(feature = "os-keyring")]
pub mod os_keyring;
pub mod memory;
mod traits;

pub use error::{StorageError, StorageResult};
pub use traits::{CommitmentStore, KeyVault, StakeStore};

use nomos_crypto::{SymmetricKey, KEY_SIZE};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

/// Draw a new stake key from the OS CSPRNG. Only vault backends call this.
pub(crate) fn generate_key() -> StorageResult<SymmetricKey> {
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng
        .try_fill_bytes(&mut bytes[..])
        .map_err(|e| StorageError::Unavailable(format!("random source: {e}")))?;
    Ok(SymmetricKey::from_bytes(*bytes))
}
