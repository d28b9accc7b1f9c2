//! Filesystem backends.
//!
//! One file per commitment, named by [`CommitmentId::storage_key`]. Key and
//! stake files are created exclusively and never rewritten in place. On Unix,
//! directories are `0700` and key files `0600`.

use crate::traits::{CommitmentStore, KeyVault, StakeStore};
use crate::{generate_key, StorageError, StorageResult};
use async_trait::async_trait;
use nomos_crypto::SymmetricKey;
use nomos_types::{Commitment, CommitmentId};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{DirBuilder, OpenOptions};
use tokio::io::AsyncWriteExt;
use zeroize::Zeroizing;

const KEY_EXT: &str = "key";
const STAKE_EXT: &str = "stake";
const RECORD_EXT: &str = "json";

#[cfg(unix)]
fn private_dir(builder: &mut DirBuilder) {
    builder.mode(0o700);
}

#[cfg(not(unix))]
fn private_dir(_builder: &mut DirBuilder) {}

#[cfg(unix)]
fn private_file(options: &mut OpenOptions) {
    options.mode(0o600);
}

#[cfg(not(unix))]
fn private_file(_options: &mut OpenOptions) {}

async fn ensure_dir(dir: &Path) -> StorageResult<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    private_dir(&mut builder);
    builder.create(dir).await?;
    Ok(())
}

/// Create `path` holding `bytes`, failing with `AlreadyExists` if present.
/// A partially written file is removed before the error is returned.
async fn create_exclusive(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    private_file(&mut options);

    let mut file = options.open(path).await?;
    let written = async {
        file.write_all(bytes).await?;
        file.sync_all().await
    }
    .await;

    if let Err(err) = written {
        drop(file);
        if let Err(cleanup) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial file");
        }
        return Err(err);
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> StorageResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn entry_path(dir: &Path, id: &CommitmentId, ext: &str) -> PathBuf {
    dir.join(format!("{}.{}", id.storage_key(), ext))
}

/// Key vault backed by a private directory.
///
/// Intended for headless hosts without a platform secret service; the
/// `os-keyring` backend is preferred where one exists.
#[derive(Debug, Clone)]
pub struct FileKeyVault {
    dir: PathBuf,
}

impl FileKeyVault {
    pub async fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        ensure_dir(&dir).await?;
        Ok(Self { dir })
    }

    fn path(&self, id: &CommitmentId) -> PathBuf {
        entry_path(&self.dir, id, KEY_EXT)
    }
}

#[async_trait]
impl KeyVault for FileKeyVault {
    async fn generate_and_store(&self, id: &CommitmentId) -> StorageResult<SymmetricKey> {
        let key = generate_key()?;
        match create_exclusive(&self.path(id), key.as_bytes()).await {
            Ok(()) => Ok(key),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::DuplicateKey(*id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn retrieve(&self, id: &CommitmentId) -> StorageResult<SymmetricKey> {
        let bytes = match tokio::fs::read(self.path(id)).await {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::KeyNotFound(*id))
            }
            Err(err) => return Err(err.into()),
        };
        SymmetricKey::try_from_slice(&bytes)
            .map_err(|e| StorageError::Unavailable(format!("corrupt key file for {id}: {e}")))
    }

    async fn contains(&self, id: &CommitmentId) -> StorageResult<bool> {
        Ok(tokio::fs::try_exists(self.path(id)).await?)
    }

    async fn delete(&self, id: &CommitmentId) -> StorageResult<()> {
        remove_if_present(&self.path(id)).await
    }
}

/// Stake store writing one sealed envelope per file.
#[derive(Debug, Clone)]
pub struct FileStakeStore {
    dir: PathBuf,
}

impl FileStakeStore {
    pub async fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        ensure_dir(&dir).await?;
        Ok(Self { dir })
    }

    fn path(&self, id: &CommitmentId) -> PathBuf {
        entry_path(&self.dir, id, STAKE_EXT)
    }
}

#[async_trait]
impl StakeStore for FileStakeStore {
    async fn write(&self, id: &CommitmentId, ciphertext: &[u8]) -> StorageResult<()> {
        match create_exclusive(&self.path(id), ciphertext).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::DuplicateBlob(*id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn read(&self, id: &CommitmentId) -> StorageResult<Vec<u8>> {
        match tokio::fs::read(self.path(id)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::BlobNotFound(*id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn contains(&self, id: &CommitmentId) -> StorageResult<bool> {
        Ok(tokio::fs::try_exists(self.path(id)).await?)
    }

    async fn delete(&self, id: &CommitmentId) -> StorageResult<()> {
        remove_if_present(&self.path(id)).await
    }
}

/// Commitment metadata as one JSON document per commitment.
#[derive(Debug, Clone)]
pub struct FileCommitmentStore {
    dir: PathBuf,
}

impl FileCommitmentStore {
    pub async fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        ensure_dir(&dir).await?;
        Ok(Self { dir })
    }

    fn path(&self, id: &CommitmentId) -> PathBuf {
        entry_path(&self.dir, id, RECORD_EXT)
    }

    /// Decode a record, discarding it if it is unreadable.
    async fn decode_or_discard(path: &Path, bytes: &[u8]) -> StorageResult<Option<Commitment>> {
        match serde_json::from_slice::<Commitment>(bytes) {
            Ok(commitment) => Ok(Some(commitment)),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Discarding undecodable commitment record"
                );
                remove_if_present(path).await?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl CommitmentStore for FileCommitmentStore {
    async fn save(&self, commitment: &Commitment) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(commitment)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let path = self.path(&commitment.id);
        let tmp = path.with_extension(format!("{RECORD_EXT}.tmp"));
        remove_if_present(&tmp).await?;
        create_exclusive(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, id: &CommitmentId) -> StorageResult<Option<Commitment>> {
        let path = self.path(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Self::decode_or_discard(&path, &bytes).await,
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self) -> StorageResult<Vec<Commitment>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut values = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                // Deleted between read_dir and read.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            if let Some(commitment) = Self::decode_or_discard(&path, &bytes).await? {
                values.push(commitment);
            }
        }

        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(values)
    }

    async fn delete(&self, id: &CommitmentId) -> StorageResult<()> {
        remove_if_present(&self.path(id)).await
    }
}
