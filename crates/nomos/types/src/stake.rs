//! Stake metadata. The stake content itself never appears here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::StakeId;

/// What the user put at risk. Descriptive only; both kinds are sealed as
/// opaque bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeKind {
    TextVow,
    ImageSymbol,
}

impl fmt::Display for StakeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeKind::TextVow => write!(f, "text vow"),
            StakeKind::ImageSymbol => write!(f, "image symbol"),
        }
    }
}

/// A sealed stake, as known to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub id: StakeId,
    pub kind: StakeKind,
    pub created_at: DateTime<Utc>,
}

impl Stake {
    pub fn new(kind: StakeKind) -> Self {
        Self {
            id: StakeId::generate(),
            kind,
            created_at: Utc::now(),
        }
    }
}
