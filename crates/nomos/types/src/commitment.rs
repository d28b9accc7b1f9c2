//! Commitment records and their resolution state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypesError;
use crate::ids::CommitmentId;
use crate::stake::StakeKind;

/// Deadline applied when the caller does not pick one, in seconds.
pub const DEFAULT_COMMITMENT_DURATION_SECS: i64 = 24 * 60 * 60;

/// [`DEFAULT_COMMITMENT_DURATION_SECS`] as a [`Duration`].
pub fn default_commitment_duration() -> Duration {
    Duration::seconds(DEFAULT_COMMITMENT_DURATION_SECS)
}

/// A positive commitment duration from caller or config input.
pub fn duration_from_secs(secs: i64) -> Result<Duration, TypesError> {
    if secs <= 0 {
        return Err(TypesError::NonPositiveDuration);
    }
    Duration::try_seconds(secs).ok_or(TypesError::DurationOutOfRange)
}

/// Outcome of a commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Judgment has not been passed yet.
    #[default]
    Unresolved,
    /// The rule was kept; the stake is returned.
    Upheld,
    /// The rule was broken; the stake is destroyed.
    Forfeited,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Unresolved => write!(f, "unresolved"),
            Resolution::Upheld => write!(f, "upheld"),
            Resolution::Forfeited => write!(f, "forfeited"),
        }
    }
}

/// A declared rule with a sealed stake and a deadline.
///
/// Holds only non-secret metadata; the stake itself lives encrypted in the
/// stake store under [`Commitment::id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub id: CommitmentId,
    pub rule: String,
    pub stake_kind: StakeKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub resolution: Resolution,
}

impl Commitment {
    /// Create an unresolved commitment starting now.
    pub fn new(
        rule: impl Into<String>,
        stake_kind: StakeKind,
        duration: Duration,
    ) -> Result<Self, TypesError> {
        Self::starting_at(rule, stake_kind, duration, Utc::now())
    }

    /// Create an unresolved commitment with an explicit start time.
    pub fn starting_at(
        rule: impl Into<String>,
        stake_kind: StakeKind,
        duration: Duration,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TypesError> {
        let rule = rule.into().trim().to_string();
        if rule.is_empty() {
            return Err(TypesError::EmptyRule);
        }
        if duration <= Duration::zero() {
            return Err(TypesError::NonPositiveDuration);
        }
        let expires_at = created_at
            .checked_add_signed(duration)
            .ok_or(TypesError::DurationOutOfRange)?;

        Ok(Self {
            id: CommitmentId::generate(),
            rule,
            stake_kind,
            created_at,
            expires_at,
            resolution: Resolution::Unresolved,
        })
    }

    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    /// Time left until the deadline, clamped at zero.
    pub fn time_remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    pub fn time_remaining(&self) -> Duration {
        self.time_remaining_at(Utc::now())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_resolved()
    }

    /// Record the verdict. Allowed exactly once.
    pub fn resolve(&mut self, outcome: Resolution) -> Result<(), TypesError> {
        if self.resolution.is_resolved() {
            return Err(TypesError::AlreadyResolved(self.resolution));
        }
        if !outcome.is_resolved() {
            return Err(TypesError::InvalidResolution);
        }
        self.resolution = outcome;
        Ok(())
    }
}
