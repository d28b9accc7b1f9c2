use nomos_types::CommitmentId;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no key stored for {0}")]
    KeyNotFound(CommitmentId),

    #[error("no stake blob stored for {0}")]
    BlobNotFound(CommitmentId),

    #[error("a key is already stored for {0}")]
    DuplicateKey(CommitmentId),

    #[error("a stake blob is already stored for {0}")]
    DuplicateBlob(CommitmentId),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}
