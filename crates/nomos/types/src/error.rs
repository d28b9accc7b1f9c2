use thiserror::Error;

use crate::commitment::Resolution;

/// Errors raised while building or transitioning Nomos values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("rule must not be empty")]
    EmptyRule,

    #[error("duration must be positive")]
    NonPositiveDuration,

    #[error("duration is too large")]
    DurationOutOfRange,

    #[error("commitment already resolved as {0}")]
    AlreadyResolved(Resolution),

    #[error("cannot resolve a commitment back to unresolved")]
    InvalidResolution,

    #[error("invalid id: {0}")]
    InvalidId(String),
}
