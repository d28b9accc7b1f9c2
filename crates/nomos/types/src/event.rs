use serde::{Deserialize, Serialize};
use std::fmt;

/// Anonymous lifecycle events reported to the event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentEvent {
    Committed,
    Upheld,
    Forfeited,
}

impl fmt::Display for CommitmentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitmentEvent::Committed => write!(f, "committed"),
            CommitmentEvent::Upheld => write!(f, "upheld"),
            CommitmentEvent::Forfeited => write!(f, "forfeited"),
        }
    }
}
