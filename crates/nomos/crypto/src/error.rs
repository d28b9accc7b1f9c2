use thiserror::Error;

/// Errors from the sealing primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Tag did not verify, or the envelope is malformed.
    #[error("authentication failed: ciphertext or key is corrupt")]
    AuthenticationFailure,

    /// The primitive itself failed. Not retried.
    #[error("crypto failure: {0}")]
    CryptoFailure(String),

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

pub type CryptoResult<T> = Result<T, CryptoError>;
