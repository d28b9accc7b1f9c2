//! Caller-facing commitment operations.
//!
//! Ties the stake lifecycle to the metadata store and the event sink. The
//! crypto path decides every outcome; metadata and events follow it
//! best-effort.

use std::sync::Arc;

use chrono::Duration;
use nomos_storage::fs::{FileCommitmentStore, FileKeyVault, FileStakeStore};
use nomos_storage::memory::{InMemoryCommitmentStore, InMemoryKeyVault, InMemoryStakeStore};
use nomos_storage::{CommitmentStore, KeyVault, StakeStore, StorageError, StorageResult};
use nomos_types::{Commitment, CommitmentEvent, CommitmentId, Resolution, StakeKind, TypesError};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{NomosConfig, StorageConfig};
use crate::error::LifecycleError;
use crate::events::{EventSink, NoopEventSink, TracingEventSink};
use crate::lifecycle::StakeLifecycle;
use crate::monitor::DeadlineMonitor;
use crate::state::{DestroyReason, DestroyReport};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Invalid(#[from] TypesError),

    #[error("stake must not be empty")]
    EmptyStake,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// The three stores a service runs on.
#[derive(Clone)]
pub struct StorageBackends {
    pub vault: Arc<dyn KeyVault>,
    pub stakes: Arc<dyn StakeStore>,
    pub commitments: Arc<dyn CommitmentStore>,
}

impl StorageBackends {
    pub fn in_memory() -> Self {
        Self {
            vault: Arc::new(InMemoryKeyVault::new()),
            stakes: Arc::new(InMemoryStakeStore::new()),
            commitments: Arc::new(InMemoryCommitmentStore::new()),
        }
    }

    /// Open the backends named by `config`.
    pub async fn open(config: &StorageConfig) -> StorageResult<Self> {
        match config {
            StorageConfig::Memory => Ok(Self::in_memory()),
            StorageConfig::Filesystem { root } => Ok(Self {
                vault: Arc::new(FileKeyVault::open(root.join("keys")).await?),
                stakes: Arc::new(FileStakeStore::open(root.join("stakes")).await?),
                commitments: Arc::new(FileCommitmentStore::open(root.join("commitments")).await?),
            }),
            StorageConfig::Keyring { root, service } => Ok(Self {
                vault: keyring_vault(service)?,
                stakes: Arc::new(FileStakeStore::open(root.join("stakes")).await?),
                commitments: Arc::new(FileCommitmentStore::open(root.join("commitments")).await?),
            }),
        }
    }
}

#[cfg(feature = "os-keyring")]
fn keyring_vault(service: &str) -> StorageResult<Arc<dyn KeyVault>> {
    Ok(Arc::new(nomos_storage::os_keyring::KeyringKeyVault::new(
        service,
    )))
}

#[cfg(not(feature = "os-keyring"))]
fn keyring_vault(_service: &str) -> StorageResult<Arc<dyn KeyVault>> {
    Err(StorageError::Unavailable(
        "built without os-keyring support".to_string(),
    ))
}

/// Commitment operations for a UI or CLI.
#[derive(Clone)]
pub struct NomosService {
    lifecycle: StakeLifecycle,
    commitments: Arc<dyn CommitmentStore>,
    events: Arc<dyn EventSink>,
    default_duration: Duration,
    timezone: String,
}

impl NomosService {
    pub fn new(
        lifecycle: StakeLifecycle,
        commitments: Arc<dyn CommitmentStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            lifecycle,
            commitments,
            events,
            default_duration: nomos_types::default_commitment_duration(),
            timezone: "UTC".to_string(),
        }
    }

    /// Build a service and its stores from configuration.
    pub async fn from_config(config: &NomosConfig) -> ServiceResult<Self> {
        let backends = StorageBackends::open(&config.storage).await?;
        let events: Arc<dyn EventSink> = if config.telemetry.enabled {
            Arc::new(TracingEventSink)
        } else {
            Arc::new(NoopEventSink)
        };

        Ok(Self::new(
            StakeLifecycle::new(backends.vault, backends.stakes),
            backends.commitments,
            events,
        )
        .with_default_duration(config.default_duration()?)
        .with_timezone(config.telemetry.timezone.clone()))
    }

    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = duration;
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn lifecycle(&self) -> &StakeLifecycle {
        &self.lifecycle
    }

    /// A deadline monitor over this service's commitments.
    pub fn deadline_monitor(
        &self,
        config: crate::config::MonitorConfig,
    ) -> (Arc<DeadlineMonitor>, tokio::sync::mpsc::Receiver<()>) {
        DeadlineMonitor::new(config, Arc::clone(&self.commitments))
    }

    /// Seal `plaintext` and record a new commitment.
    ///
    /// If the commitment cannot be recorded the sealed stake is discarded, so
    /// no stake outlives its metadata.
    pub async fn create_commitment(
        &self,
        rule: &str,
        stake_kind: StakeKind,
        plaintext: &[u8],
        duration: Option<Duration>,
    ) -> ServiceResult<Commitment> {
        if plaintext.is_empty() {
            return Err(ServiceError::EmptyStake);
        }
        let commitment = Commitment::new(
            rule,
            stake_kind,
            duration.unwrap_or(self.default_duration),
        )?;

        let stake = self
            .lifecycle
            .seal(&commitment.id, plaintext, stake_kind)
            .await?;

        if let Err(err) = self.commitments.save(&commitment).await {
            tracing::warn!(
                commitment_id = %commitment.id,
                error = %err,
                "Commitment metadata save failed, discarding sealed stake"
            );
            if let Err(rollback) = self.lifecycle.discard(&commitment.id).await {
                tracing::error!(
                    commitment_id = %commitment.id,
                    error = %rollback,
                    "Failed to discard stake after metadata failure"
                );
            }
            return Err(err.into());
        }

        tracing::info!(
            commitment_id = %commitment.id,
            stake_id = %stake.id,
            expires_at = %commitment.expires_at,
            "Commitment created"
        );
        self.emit(CommitmentEvent::Committed);
        Ok(commitment)
    }

    pub fn check_expiry(&self, commitment: &Commitment) -> bool {
        commitment.has_expired()
    }

    /// Upheld: reveal the stake. Call
    /// [`NomosService::finalize_after_reveal`] once it has been shown.
    pub async fn resolve_success(&self, id: &CommitmentId) -> ServiceResult<Zeroizing<Vec<u8>>> {
        let plaintext = self.lifecycle.reveal(id).await.map_err(|err| match err {
            // After a forfeit the key is simply gone.
            LifecycleError::AlreadyResolved {
                id,
                reason: DestroyReason::Forfeited,
            } => LifecycleError::KeyNotFound(id),
            other => other,
        })?;

        self.record_resolution(id, Resolution::Upheld).await;
        self.emit(CommitmentEvent::Upheld);
        Ok(plaintext)
    }

    /// Forfeited: destroy the stake unseen.
    pub async fn resolve_failure(&self, id: &CommitmentId) -> ServiceResult<DestroyReport> {
        let report = self.lifecycle.destroy(id).await?;
        self.forget(id).await;
        self.emit(CommitmentEvent::Forfeited);
        Ok(report)
    }

    /// Destroy a stake after it has been revealed.
    pub async fn finalize_after_reveal(&self, id: &CommitmentId) -> ServiceResult<DestroyReport> {
        let report = self.lifecycle.cleanup(id).await?;
        self.forget(id).await;
        Ok(report)
    }

    pub async fn commitment(&self, id: &CommitmentId) -> ServiceResult<Option<Commitment>> {
        Ok(self.commitments.load(id).await?)
    }

    /// Unresolved commitments, newest first.
    pub async fn active_commitments(&self) -> ServiceResult<Vec<Commitment>> {
        Ok(self
            .commitments
            .list()
            .await?
            .into_iter()
            .filter(|c| !c.is_resolved())
            .collect())
    }

    async fn record_resolution(&self, id: &CommitmentId, outcome: Resolution) {
        let result = async {
            if let Some(mut commitment) = self.commitments.load(id).await? {
                if !commitment.is_resolved() {
                    commitment.resolution = outcome;
                    self.commitments.save(&commitment).await?;
                }
            }
            Ok::<_, StorageError>(())
        }
        .await;

        if let Err(err) = result {
            tracing::warn!(commitment_id = %id, error = %err, "Failed to record resolution");
        }
    }

    async fn forget(&self, id: &CommitmentId) {
        if let Err(err) = self.commitments.delete(id).await {
            tracing::warn!(commitment_id = %id, error = %err, "Failed to delete commitment metadata");
        }
    }

    fn emit(&self, event: CommitmentEvent) {
        let sink = Arc::clone(&self.events);
        let timezone = self.timezone.clone();
        tokio::spawn(async move {
            if let Err(err) = sink.submit(event, &timezone).await {
                tracing::debug!(event = %event, error = %err, "Event submission failed");
            }
        });
    }
}
