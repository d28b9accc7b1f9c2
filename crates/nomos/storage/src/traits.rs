use crate::StorageResult;
use async_trait::async_trait;
use nomos_crypto::SymmetricKey;
use nomos_types::{Commitment, CommitmentId};

/// Custody of per-commitment stake keys.
///
/// `delete` is the point of no return: once it succeeds the stake cannot be
/// recovered by any code path.
#[async_trait]
pub trait KeyVault: Send + Sync {
    /// Mint a fresh random key, persist it under `id` and return it.
    /// Fails with `DuplicateKey` if `id` already holds a key.
    async fn generate_and_store(&self, id: &CommitmentId) -> StorageResult<SymmetricKey>;

    /// Fails with `KeyNotFound` if absent.
    async fn retrieve(&self, id: &CommitmentId) -> StorageResult<SymmetricKey>;

    async fn contains(&self, id: &CommitmentId) -> StorageResult<bool>;

    /// Idempotent.
    async fn delete(&self, id: &CommitmentId) -> StorageResult<()>;
}

/// Durable store of sealed stake envelopes.
#[async_trait]
pub trait StakeStore: Send + Sync {
    /// Fails with `DuplicateBlob` rather than overwrite.
    async fn write(&self, id: &CommitmentId, ciphertext: &[u8]) -> StorageResult<()>;

    /// Fails with `BlobNotFound` if absent.
    async fn read(&self, id: &CommitmentId) -> StorageResult<Vec<u8>>;

    async fn contains(&self, id: &CommitmentId) -> StorageResult<bool>;

    /// Idempotent.
    async fn delete(&self, id: &CommitmentId) -> StorageResult<()>;
}

/// Non-secret commitment metadata.
///
/// Records that cannot be decoded are dropped and reported as absent.
#[async_trait]
pub trait CommitmentStore: Send + Sync {
    /// Insert or replace.
    async fn save(&self, commitment: &Commitment) -> StorageResult<()>;

    async fn load(&self, id: &CommitmentId) -> StorageResult<Option<Commitment>>;

    /// All records, newest first.
    async fn list(&self) -> StorageResult<Vec<Commitment>>;

    /// Idempotent.
    async fn delete(&self, id: &CommitmentId) -> StorageResult<()>;
}
