//! Key vault backed by the platform secret service (macOS Keychain, Windows
//! Credential Manager, Secret Service on Linux).
//!
//! Keys are stored hex-encoded, one entry per commitment, under a shared
//! service name. Keyring calls block, so they run on tokio's blocking pool.

use crate::traits::KeyVault;
use crate::{generate_key, StorageError, StorageResult};
use async_trait::async_trait;
use keyring::Entry;
use nomos_crypto::SymmetricKey;
use nomos_types::CommitmentId;
use zeroize::Zeroizing;

/// Service name used when none is configured.
pub const DEFAULT_SERVICE: &str = "nomos.stake-keys";

#[derive(Debug, Clone)]
pub struct KeyringKeyVault {
    service: String,
}

impl KeyringKeyVault {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    async fn with_entry<T, F>(&self, id: &CommitmentId, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> StorageResult<T> + Send + 'static,
    {
        let service = self.service.clone();
        let account = id.storage_key();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &account).map_err(unavailable)?;
            op(entry)
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("keyring task failed: {e}")))?
    }
}

impl Default for KeyringKeyVault {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

fn unavailable(err: keyring::Error) -> StorageError {
    StorageError::Unavailable(format!("keyring: {err}"))
}

fn decode(id: CommitmentId, secret: &str) -> StorageResult<SymmetricKey> {
    let bytes = Zeroizing::new(
        hex::decode(secret)
            .map_err(|e| StorageError::Unavailable(format!("corrupt keyring entry for {id}: {e}")))?,
    );
    SymmetricKey::try_from_slice(&bytes)
        .map_err(|e| StorageError::Unavailable(format!("corrupt keyring entry for {id}: {e}")))
}

#[async_trait]
impl KeyVault for KeyringKeyVault {
    async fn generate_and_store(&self, id: &CommitmentId) -> StorageResult<SymmetricKey> {
        let id = *id;
        self.with_entry(&id, move |entry| {
            match entry.get_password() {
                Ok(_) => return Err(StorageError::DuplicateKey(id)),
                Err(keyring::Error::NoEntry) => {}
                Err(err) => return Err(unavailable(err)),
            }
            let key = generate_key()?;
            let encoded = Zeroizing::new(hex::encode(key.as_bytes()));
            entry.set_password(&encoded).map_err(unavailable)?;
            Ok(key)
        })
        .await
    }

    async fn retrieve(&self, id: &CommitmentId) -> StorageResult<SymmetricKey> {
        let id = *id;
        self.with_entry(&id, move |entry| match entry.get_password() {
            Ok(secret) => {
                let secret = Zeroizing::new(secret);
                decode(id, &secret)
            }
            Err(keyring::Error::NoEntry) => Err(StorageError::KeyNotFound(id)),
            Err(err) => Err(unavailable(err)),
        })
        .await
    }

    async fn contains(&self, id: &CommitmentId) -> StorageResult<bool> {
        self.with_entry(id, |entry| match entry.get_password() {
            Ok(secret) => {
                drop(Zeroizing::new(secret));
                Ok(true)
            }
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(unavailable(err)),
        })
        .await
    }

    async fn delete(&self, id: &CommitmentId) -> StorageResult<()> {
        self.with_entry(id, |entry| match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(unavailable(err)),
        })
        .await
    }
}
