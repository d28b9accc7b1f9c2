//! Per-commitment stake states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a stake ended up destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyReason {
    /// Judged a failure; destroyed without being revealed.
    Forfeited,
    /// Revealed, then cleaned up.
    Finalized,
}

impl fmt::Display for DestroyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestroyReason::Forfeited => write!(f, "forfeited"),
            DestroyReason::Finalized => write!(f, "finalized"),
        }
    }
}

/// Where a commitment's stake is in its lifecycle.
///
/// ```text
/// Unsealed -> Sealed -> RevealedPendingCleanup -> Destroyed(Finalized)
///                    \-> Destroyed(Forfeited)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeState {
    /// Not known to be sealed by this process. The stores are consulted.
    Unsealed,
    Sealed,
    RevealedPendingCleanup,
    Destroyed(DestroyReason),
}

impl fmt::Display for StakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeState::Unsealed => write!(f, "unsealed"),
            StakeState::Sealed => write!(f, "sealed"),
            StakeState::RevealedPendingCleanup => write!(f, "revealed (pending cleanup)"),
            StakeState::Destroyed(reason) => write!(f, "destroyed ({reason})"),
        }
    }
}

/// Outcome of a destroy or cleanup.
///
/// The key is always gone when one of these is returned. `blob_removed` is
/// false when the best-effort blob deletion failed; the leftover is inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyReport {
    pub blob_removed: bool,
}
