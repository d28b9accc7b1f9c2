//! Nomos stake lifecycle.
//!
//! A commitment's stake is sealed under a key held in the key vault. The
//! verdict decides its fate exactly once:
//! - upheld: [`StakeLifecycle::reveal`] then [`StakeLifecycle::cleanup`]
//! - forfeited: [`StakeLifecycle::destroy`]
//!
//! Deleting the key is the irreversible step; the sealed blob is worthless
//! without it. [`NomosService`] is the caller-facing surface that keeps the
//! commitment metadata and anonymous events in step with the lifecycle, and
//! [`DeadlineMonitor`] announces when a verdict is due.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
mod error;
pub mod events;
mod lifecycle;
pub mod monitor;
mod service;
mod state;

pub use config::NomosConfig;
pub use error::{LifecycleError, LifecycleResult};
pub use events::{EventSink, EventSinkError, MemoryEventSink, NoopEventSink, TracingEventSink};
pub use lifecycle::StakeLifecycle;
pub use monitor::{DeadlineMonitor, VerdictRequired};
pub use service::{NomosService, ServiceError, ServiceResult, StorageBackends};
pub use state::{DestroyReason, DestroyReport, StakeState};
