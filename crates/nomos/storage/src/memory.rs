//! In-memory reference implementations of the Nomos storage traits.
//!
//! Deterministic and test-friendly. Nothing survives the process, so a
//! forgotten in-memory key is as gone as a deleted one.

use crate::traits::{CommitmentStore, KeyVault, StakeStore};
use crate::{generate_key, StorageError, StorageResult};
use async_trait::async_trait;
use nomos_crypto::SymmetricKey;
use nomos_types::{Commitment, CommitmentId};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

fn read_guard<'a, T>(
    lock: &'a RwLock<T>,
    what: &str,
) -> StorageResult<RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| StorageError::Unavailable(format!("{what} lock poisoned")))
}

fn write_guard<'a, T>(
    lock: &'a RwLock<T>,
    what: &str,
) -> StorageResult<RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| StorageError::Unavailable(format!("{what} lock poisoned")))
}

/// In-memory key vault.
#[derive(Default)]
pub struct InMemoryKeyVault {
    keys: RwLock<HashMap<CommitmentId, SymmetricKey>>,
}

impl InMemoryKeyVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.keys.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyVault for InMemoryKeyVault {
    async fn generate_and_store(&self, id: &CommitmentId) -> StorageResult<SymmetricKey> {
        let mut guard = write_guard(&self.keys, "key vault")?;
        if guard.contains_key(id) {
            return Err(StorageError::DuplicateKey(*id));
        }
        let key = generate_key()?;
        guard.insert(*id, key.clone());
        Ok(key)
    }

    async fn retrieve(&self, id: &CommitmentId) -> StorageResult<SymmetricKey> {
        let guard = read_guard(&self.keys, "key vault")?;
        guard.get(id).cloned().ok_or(StorageError::KeyNotFound(*id))
    }

    async fn contains(&self, id: &CommitmentId) -> StorageResult<bool> {
        Ok(read_guard(&self.keys, "key vault")?.contains_key(id))
    }

    async fn delete(&self, id: &CommitmentId) -> StorageResult<()> {
        write_guard(&self.keys, "key vault")?.remove(id);
        Ok(())
    }
}

/// In-memory stake store.
#[derive(Default)]
pub struct InMemoryStakeStore {
    blobs: RwLock<HashMap<CommitmentId, Vec<u8>>>,
}

impl InMemoryStakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StakeStore for InMemoryStakeStore {
    async fn write(&self, id: &CommitmentId, ciphertext: &[u8]) -> StorageResult<()> {
        let mut guard = write_guard(&self.blobs, "stake store")?;
        if guard.contains_key(id) {
            return Err(StorageError::DuplicateBlob(*id));
        }
        guard.insert(*id, ciphertext.to_vec());
        Ok(())
    }

    async fn read(&self, id: &CommitmentId) -> StorageResult<Vec<u8>> {
        let guard = read_guard(&self.blobs, "stake store")?;
        guard.get(id).cloned().ok_or(StorageError::BlobNotFound(*id))
    }

    async fn contains(&self, id: &CommitmentId) -> StorageResult<bool> {
        Ok(read_guard(&self.blobs, "stake store")?.contains_key(id))
    }

    async fn delete(&self, id: &CommitmentId) -> StorageResult<()> {
        write_guard(&self.blobs, "stake store")?.remove(id);
        Ok(())
    }
}

/// In-memory commitment metadata store.
#[derive(Default)]
pub struct InMemoryCommitmentStore {
    commitments: RwLock<HashMap<CommitmentId, Commitment>>,
}

impl InMemoryCommitmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommitmentStore for InMemoryCommitmentStore {
    async fn save(&self, commitment: &Commitment) -> StorageResult<()> {
        write_guard(&self.commitments, "commitments")?.insert(commitment.id, commitment.clone());
        Ok(())
    }

    async fn load(&self, id: &CommitmentId) -> StorageResult<Option<Commitment>> {
        Ok(read_guard(&self.commitments, "commitments")?.get(id).cloned())
    }

    async fn list(&self) -> StorageResult<Vec<Commitment>> {
        let guard = read_guard(&self.commitments, "commitments")?;
        let mut values = guard.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(values)
    }

    async fn delete(&self, id: &CommitmentId) -> StorageResult<()> {
        write_guard(&self.commitments, "commitments")?.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use nomos_types::{Resolution, StakeKind};

    #[tokio::test]
    async fn vault_rejects_duplicate_keys() {
        let vault = InMemoryKeyVault::new();
        let id = CommitmentId::generate();

        let key = vault.generate_and_store(&id).await.unwrap();
        let again = vault.generate_and_store(&id).await;
        assert!(matches!(again, Err(StorageError::DuplicateKey(found)) if found == id));

        let stored = vault.retrieve(&id).await.unwrap();
        assert_eq!(stored.as_bytes(), key.as_bytes());
    }

    #[tokio::test]
    async fn vault_keys_are_distinct_per_id() {
        let vault = InMemoryKeyVault::new();
        let a = vault.generate_and_store(&CommitmentId::generate()).await.unwrap();
        let b = vault.generate_and_store(&CommitmentId::generate()).await.unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_eq!(vault.len(), 2);
    }

    #[tokio::test]
    async fn vault_delete_is_idempotent() {
        let vault = InMemoryKeyVault::new();
        let id = CommitmentId::generate();
        vault.generate_and_store(&id).await.unwrap();

        vault.delete(&id).await.unwrap();
        vault.delete(&id).await.unwrap();

        assert!(matches!(
            vault.retrieve(&id).await,
            Err(StorageError::KeyNotFound(_))
        ));
        assert!(vault.is_empty());
    }

    #[tokio::test]
    async fn stake_store_rejects_overwrite_and_deletes_idempotently() {
        let store = InMemoryStakeStore::new();
        let id = CommitmentId::generate();

        store.write(&id, b"sealed").await.unwrap();
        assert!(matches!(
            store.write(&id, b"other").await,
            Err(StorageError::DuplicateBlob(_))
        ));
        assert_eq!(store.read(&id).await.unwrap(), b"sealed");

        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(matches!(
            store.read(&id).await,
            Err(StorageError::BlobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn commitment_store_upserts_and_lists_newest_first() {
        let store = InMemoryCommitmentStore::new();
        let now = chrono::Utc::now();
        let older = Commitment::starting_at(
            "older",
            StakeKind::TextVow,
            Duration::hours(1),
            now - Duration::minutes(5),
        )
        .unwrap();
        let mut newer =
            Commitment::starting_at("newer", StakeKind::ImageSymbol, Duration::hours(1), now)
                .unwrap();

        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();

        newer.resolve(Resolution::Upheld).unwrap();
        store.save(&newer).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[0].resolution, Resolution::Upheld);

        store.delete(&older.id).await.unwrap();
        store.delete(&older.id).await.unwrap();
        assert!(store.load(&older.id).await.unwrap().is_none());
    }
}
