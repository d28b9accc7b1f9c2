use nomos_storage::StorageError;
use nomos_types::CommitmentId;
use thiserror::Error;

use crate::state::{DestroyReason, StakeState};

/// Errors surfaced by [`StakeLifecycle`](crate::StakeLifecycle).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The stake is gone (destroyed earlier) or never existed.
    #[error("no key for {0}: nothing to resolve")]
    KeyNotFound(CommitmentId),

    #[error("no sealed stake for {0}: nothing to resolve")]
    BlobNotFound(CommitmentId),

    #[error("{0} is already sealed")]
    DuplicateKey(CommitmentId),

    #[error("a sealed stake already exists for {0}")]
    DuplicateBlob(CommitmentId),

    /// Ciphertext or key is corrupt. The stake is unrecoverable.
    #[error("stake for {0} failed authentication")]
    AuthenticationFailure(CommitmentId),

    #[error("{id} is already resolved ({reason})")]
    AlreadyResolved {
        id: CommitmentId,
        reason: DestroyReason,
    },

    #[error("{id} is {found}; operation requires {expected}")]
    InvalidState {
        id: CommitmentId,
        expected: StakeState,
        found: StakeState,
    },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("crypto failure: {0}")]
    CryptoFailure(String),
}

impl LifecycleError {
    /// Only an unreachable store is worth retrying; every other error
    /// describes a settled fact about the stake.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LifecycleError::StorageUnavailable(_))
    }
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::KeyNotFound(id) => LifecycleError::KeyNotFound(id),
            StorageError::BlobNotFound(id) => LifecycleError::BlobNotFound(id),
            StorageError::DuplicateKey(id) => LifecycleError::DuplicateKey(id),
            StorageError::DuplicateBlob(id) => LifecycleError::DuplicateBlob(id),
            StorageError::Unavailable(msg) | StorageError::Serialization(msg) => {
                LifecycleError::StorageUnavailable(msg)
            }
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_outages_are_retryable() {
        let id = CommitmentId::generate();
        assert!(LifecycleError::StorageUnavailable("disk".into()).is_retryable());
        assert!(!LifecycleError::KeyNotFound(id).is_retryable());
        assert!(!LifecycleError::AuthenticationFailure(id).is_retryable());
        assert!(!LifecycleError::AlreadyResolved {
            id,
            reason: DestroyReason::Forfeited
        }
        .is_retryable());
    }

    #[test]
    fn storage_errors_keep_their_meaning() {
        let id = CommitmentId::generate();
        assert!(matches!(
            LifecycleError::from(StorageError::KeyNotFound(id)),
            LifecycleError::KeyNotFound(found) if found == id
        ));
        assert!(matches!(
            LifecycleError::from(StorageError::Unavailable("offline".into())),
            LifecycleError::StorageUnavailable(_)
        ));
    }
}
