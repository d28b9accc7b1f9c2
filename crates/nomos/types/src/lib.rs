//! Nomos core types.
//!
//! A commitment is a rule plus a deadline. Its stake is sealed elsewhere and
//! addressed only through [`CommitmentId`].

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![warn(rust_2018_idioms)]

mod commitment;
mod error;
mod event;
mod ids;
mod stake;

pub use commitment::{
    default_commitment_duration, duration_from_secs, Commitment, Resolution,
    DEFAULT_COMMITMENT_DURATION_SECS,
};
pub use error::TypesError;
pub use event::CommitmentEvent;
pub use ids::{CommitmentId, StakeId};
pub use stake::{Stake, StakeKind};
