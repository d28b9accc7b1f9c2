//! Anonymous lifecycle event reporting.
//!
//! Delivery is fire-and-forget: a sink failure never changes the outcome of a
//! lifecycle operation.

use async_trait::async_trait;
use nomos_types::CommitmentEvent;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventSinkError {
    #[error("event sink unavailable: {0}")]
    Unavailable(String),
}

/// Receives anonymous `(event, timezone)` pairs.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn submit(&self, event: CommitmentEvent, timezone: &str) -> Result<(), EventSinkError>;
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn submit(&self, _event: CommitmentEvent, _timezone: &str) -> Result<(), EventSinkError> {
        Ok(())
    }
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn submit(&self, event: CommitmentEvent, timezone: &str) -> Result<(), EventSinkError> {
        tracing::info!(event = %event, timezone = timezone, "Commitment event");
        Ok(())
    }
}

/// Records events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<(CommitmentEvent, String)>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(CommitmentEvent, String)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn submit(&self, event: CommitmentEvent, timezone: &str) -> Result<(), EventSinkError> {
        self.events
            .lock()
            .map_err(|_| EventSinkError::Unavailable("event log lock poisoned".to_string()))?
            .push((event, timezone.to_string()));
        Ok(())
    }
}
