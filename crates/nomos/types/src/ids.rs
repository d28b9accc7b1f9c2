//! Strongly-typed identifiers for Nomos entities
//!
//! All IDs are UUID-based but wrapped in newtype structs for type safety.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::TypesError;

/// Unique identifier for a commitment.
///
/// This is the sole address of a commitment's key and stake blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitmentId(Uuid);

impl CommitmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Filesystem- and keyring-safe form of the id.
    pub fn storage_key(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl fmt::Display for CommitmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nomos:{}", self.0)
    }
}

impl FromStr for CommitmentId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("nomos:").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| TypesError::InvalidId(format!("{s}: {e}")))
    }
}

/// Unique identifier for a stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StakeId(Uuid);

impl StakeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stake:{}", self.0)
    }
}
