//! Stake lifecycle orchestration.
//!
//! Couples the key vault, the stake store and the cipher so that a key and
//! its sealed blob are created and destroyed together. Rules:
//!
//! - every operation on a commitment id holds that id's lock for its whole run
//! - the key is always deleted before the blob
//! - a destroy succeeds the moment the key is gone; blob removal is best-effort
//! - operations run on their own task, so dropping the caller's future never
//!   abandons a half-finished destroy

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use nomos_crypto::{CipherEngine, CryptoError};
use nomos_storage::{KeyVault, StakeStore};
use nomos_types::{CommitmentId, Stake, StakeKind};
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use crate::error::{LifecycleError, LifecycleResult};
use crate::state::{DestroyReason, DestroyReport, StakeState};

/// Seals stakes and resolves them exactly once.
///
/// Cheap to clone; clones share stores and the per-id lock table.
#[derive(Clone)]
pub struct StakeLifecycle {
    inner: Arc<Inner>,
}

struct Inner {
    vault: Arc<dyn KeyVault>,
    stakes: Arc<dyn StakeStore>,
    cipher: CipherEngine,
    slots: DashMap<CommitmentId, Arc<Mutex<StakeState>>>,
}

/// Associated data binding a sealed blob to its commitment.
fn binding(id: &CommitmentId) -> Vec<u8> {
    format!("nomos-stake:{}", id.storage_key()).into_bytes()
}

/// Run `fut` on its own task and wait for it. The task keeps going even if
/// the returned future is dropped.
async fn run_to_completion<T, F>(fut: F) -> LifecycleResult<T>
where
    T: Send + 'static,
    F: Future<Output = LifecycleResult<T>> + Send + 'static,
{
    tokio::spawn(fut)
        .await
        .map_err(|e| LifecycleError::StorageUnavailable(format!("lifecycle task failed: {e}")))?
}

impl StakeLifecycle {
    pub fn new(vault: Arc<dyn KeyVault>, stakes: Arc<dyn StakeStore>) -> Self {
        Self::with_cipher(vault, stakes, CipherEngine::new())
    }

    pub fn with_cipher(
        vault: Arc<dyn KeyVault>,
        stakes: Arc<dyn StakeStore>,
        cipher: CipherEngine,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                vault,
                stakes,
                cipher,
                slots: DashMap::new(),
            }),
        }
    }

    /// Current state as seen by this process.
    pub async fn state(&self, id: &CommitmentId) -> StakeState {
        let slot = self.inner.slots.get(id).map(|s| Arc::clone(s.value()));
        match slot {
            Some(slot) => *slot.lock().await,
            None => StakeState::Unsealed,
        }
    }

    /// Generate a key, seal `plaintext` under it and store the envelope.
    ///
    /// If anything after key creation fails, the key is deleted again before
    /// the error is returned.
    pub async fn seal(
        &self,
        id: &CommitmentId,
        plaintext: &[u8],
        kind: StakeKind,
    ) -> LifecycleResult<Stake> {
        let id = *id;
        let plaintext = Zeroizing::new(plaintext.to_vec());
        self.run(id, move |inner| async move { inner.seal(id, plaintext, kind).await })
            .await
    }

    /// Decrypt the stake. The caller shows it once and then calls
    /// [`StakeLifecycle::cleanup`].
    pub async fn reveal(&self, id: &CommitmentId) -> LifecycleResult<Zeroizing<Vec<u8>>> {
        let id = *id;
        self.run(id, move |inner| async move { inner.reveal(id).await })
            .await
    }

    /// Destroy a revealed stake.
    pub async fn cleanup(&self, id: &CommitmentId) -> LifecycleResult<DestroyReport> {
        let id = *id;
        self.run(id, move |inner| async move { inner.cleanup(id).await })
            .await
    }

    /// Destroy a sealed stake without revealing it.
    pub async fn destroy(&self, id: &CommitmentId) -> LifecycleResult<DestroyReport> {
        let id = *id;
        self.run(id, move |inner| async move { inner.destroy(id).await })
            .await
    }

    /// Run `op` to completion, then drop the id's lock slot if it is idle and
    /// back to `Unsealed`. Destroyed slots stay so later calls see the verdict.
    async fn run<T, F, Fut>(&self, id: CommitmentId, op: F) -> LifecycleResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Inner>) -> Fut,
        Fut: Future<Output = LifecycleResult<T>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let fut = op(Arc::clone(&inner));
        run_to_completion(async move {
            let result = fut.await;
            inner.release_if_idle(&id);
            result
        })
        .await
    }

    /// Undo a seal whose commitment could not be recorded. The id returns to
    /// `Unsealed`.
    pub async fn discard(&self, id: &CommitmentId) -> LifecycleResult<()> {
        let id = *id;
        self.run(id, move |inner| async move { inner.discard(id).await })
            .await
    }
}

impl Inner {
    fn slot(&self, id: &CommitmentId) -> Arc<Mutex<StakeState>> {
        let entry = self
            .slots
            .entry(*id)
            .or_insert_with(|| Arc::new(Mutex::new(StakeState::Unsealed)));
        Arc::clone(entry.value())
    }

    /// An `Unsealed` slot carries nothing the stores don't, so it is only kept
    /// while some operation still holds it.
    fn release_if_idle(&self, id: &CommitmentId) {
        self.slots.remove_if(id, |_, slot| {
            Arc::strong_count(slot) == 1
                && slot
                    .try_lock()
                    .map(|state| *state == StakeState::Unsealed)
                    .unwrap_or(false)
        });
    }

    async fn seal(
        &self,
        id: CommitmentId,
        plaintext: Zeroizing<Vec<u8>>,
        kind: StakeKind,
    ) -> LifecycleResult<Stake> {
        let slot = self.slot(&id);
        let mut state = slot.lock().await;

        match *state {
            StakeState::Unsealed => {}
            StakeState::Sealed | StakeState::RevealedPendingCleanup => {
                return Err(LifecycleError::DuplicateKey(id))
            }
            StakeState::Destroyed(reason) => {
                return Err(LifecycleError::AlreadyResolved { id, reason })
            }
        }

        let key = self.vault.generate_and_store(&id).await?;

        let envelope = match self.cipher.seal_bound(&plaintext, &key, &binding(&id)) {
            Ok(envelope) => envelope,
            Err(err) => {
                drop(key);
                self.roll_back_key(&id).await;
                return Err(LifecycleError::CryptoFailure(err.to_string()));
            }
        };
        drop(key);

        if let Err(err) = self.stakes.write(&id, &envelope).await {
            tracing::warn!(commitment_id = %id, error = %err, "Stake write failed, rolling back key");
            self.roll_back_key(&id).await;
            return Err(err.into());
        }

        *state = StakeState::Sealed;
        tracing::info!(commitment_id = %id, kind = %kind, "Stake sealed");
        Ok(Stake::new(kind))
    }

    async fn roll_back_key(&self, id: &CommitmentId) {
        if let Err(err) = self.vault.delete(id).await {
            tracing::error!(
                commitment_id = %id,
                error = %err,
                "Failed to roll back key after aborted seal; orphaned key left in vault"
            );
        }
    }

    async fn reveal(&self, id: CommitmentId) -> LifecycleResult<Zeroizing<Vec<u8>>> {
        let slot = self.slot(&id);
        let mut state = slot.lock().await;

        match *state {
            StakeState::Unsealed | StakeState::Sealed => {}
            StakeState::RevealedPendingCleanup => {
                return Err(LifecycleError::InvalidState {
                    id,
                    expected: StakeState::Sealed,
                    found: *state,
                })
            }
            StakeState::Destroyed(reason) => {
                return Err(LifecycleError::AlreadyResolved { id, reason })
            }
        }

        let key = self.vault.retrieve(&id).await?;
        let envelope = self.stakes.read(&id).await?;
        // Both halves exist, whatever this process knew before.
        *state = StakeState::Sealed;

        let plaintext = self
            .cipher
            .open_bound(&envelope, &key, &binding(&id))
            .map_err(|err| match err {
                CryptoError::AuthenticationFailure => {
                    tracing::error!(commitment_id = %id, "Sealed stake failed authentication");
                    LifecycleError::AuthenticationFailure(id)
                }
                other => LifecycleError::CryptoFailure(other.to_string()),
            })?;

        *state = StakeState::RevealedPendingCleanup;
        tracing::info!(commitment_id = %id, "Stake revealed");
        Ok(Zeroizing::new(plaintext))
    }

    async fn cleanup(&self, id: CommitmentId) -> LifecycleResult<DestroyReport> {
        let slot = self.slot(&id);
        let mut state = slot.lock().await;

        if *state != StakeState::RevealedPendingCleanup {
            return Err(LifecycleError::InvalidState {
                id,
                expected: StakeState::RevealedPendingCleanup,
                found: *state,
            });
        }

        self.delete_key(&id).await?;
        *state = StakeState::Destroyed(DestroyReason::Finalized);

        let report = self.delete_blob_best_effort(&id).await;
        tracing::info!(commitment_id = %id, blob_removed = report.blob_removed, "Revealed stake cleaned up");
        Ok(report)
    }

    async fn destroy(&self, id: CommitmentId) -> LifecycleResult<DestroyReport> {
        let slot = self.slot(&id);
        let mut state = slot.lock().await;

        match *state {
            StakeState::Sealed => {}
            StakeState::Unsealed => {
                if !self.vault.contains(&id).await? {
                    return Err(LifecycleError::KeyNotFound(id));
                }
            }
            StakeState::RevealedPendingCleanup => {
                return Err(LifecycleError::InvalidState {
                    id,
                    expected: StakeState::Sealed,
                    found: *state,
                })
            }
            StakeState::Destroyed(reason) => {
                return Err(LifecycleError::AlreadyResolved { id, reason })
            }
        }

        self.delete_key(&id).await?;
        *state = StakeState::Destroyed(DestroyReason::Forfeited);

        let report = self.delete_blob_best_effort(&id).await;
        tracing::info!(commitment_id = %id, blob_removed = report.blob_removed, "Stake destroyed");
        Ok(report)
    }

    async fn discard(&self, id: CommitmentId) -> LifecycleResult<()> {
        let slot = self.slot(&id);
        let mut state = slot.lock().await;

        if *state != StakeState::Sealed {
            return Err(LifecycleError::InvalidState {
                id,
                expected: StakeState::Sealed,
                found: *state,
            });
        }

        self.delete_key(&id).await?;
        self.delete_blob_best_effort(&id).await;
        *state = StakeState::Unsealed;
        tracing::info!(commitment_id = %id, "Seal discarded");
        Ok(())
    }

    /// Key deletion is what makes a resolution irreversible; failing it is
    /// the one loud error.
    async fn delete_key(&self, id: &CommitmentId) -> LifecycleResult<()> {
        self.vault.delete(id).await.map_err(|err| {
            tracing::error!(
                commitment_id = %id,
                error = %err,
                "Key deletion failed; stake is still recoverable"
            );
            LifecycleError::from(err)
        })
    }

    async fn delete_blob_best_effort(&self, id: &CommitmentId) -> DestroyReport {
        match self.stakes.delete(id).await {
            Ok(()) => DestroyReport { blob_removed: true },
            Err(err) => {
                tracing::warn!(
                    commitment_id = %id,
                    error = %err,
                    "Blob deletion failed; leftover ciphertext is inert without its key"
                );
                DestroyReport {
                    blob_removed: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomos_storage::memory::{InMemoryKeyVault, InMemoryStakeStore};

    fn lifecycle() -> (StakeLifecycle, Arc<InMemoryKeyVault>, Arc<InMemoryStakeStore>) {
        let vault = Arc::new(InMemoryKeyVault::new());
        let stakes = Arc::new(InMemoryStakeStore::new());
        (
            StakeLifecycle::new(vault.clone(), stakes.clone()),
            vault,
            stakes,
        )
    }

    #[tokio::test]
    async fn seal_then_reveal_returns_plaintext() {
        let (lifecycle, _, _) = lifecycle();
        let id = CommitmentId::generate();

        let stake = lifecycle.seal(&id, b"hello", StakeKind::TextVow).await.unwrap();
        assert_eq!(stake.kind, StakeKind::TextVow);
        assert_eq!(lifecycle.state(&id).await, StakeState::Sealed);

        let plaintext = lifecycle.reveal(&id).await.unwrap();
        assert_eq!(plaintext.as_slice(), b"hello");
        assert_eq!(lifecycle.state(&id).await, StakeState::RevealedPendingCleanup);
    }

    #[tokio::test]
    async fn stored_blob_is_not_plaintext() {
        let (lifecycle, _, stakes) = lifecycle();
        let id = CommitmentId::generate();
        lifecycle
            .seal(&id, b"a very secret vow", StakeKind::TextVow)
            .await
            .unwrap();

        let blob = stakes.read(&id).await.unwrap();
        assert!(!blob
            .windows(b"secret".len())
            .any(|w| w == b"secret"));
    }

    #[tokio::test]
    async fn second_seal_is_rejected() {
        let (lifecycle, _, _) = lifecycle();
        let id = CommitmentId::generate();
        lifecycle.seal(&id, b"one", StakeKind::TextVow).await.unwrap();

        let again = lifecycle.seal(&id, b"two", StakeKind::TextVow).await;
        assert!(matches!(again, Err(LifecycleError::DuplicateKey(_))));
        assert_eq!(lifecycle.reveal(&id).await.unwrap().as_slice(), b"one");
    }

    #[tokio::test]
    async fn reveal_twice_requires_cleanup_first() {
        let (lifecycle, _, _) = lifecycle();
        let id = CommitmentId::generate();
        lifecycle.seal(&id, b"once", StakeKind::TextVow).await.unwrap();
        lifecycle.reveal(&id).await.unwrap();

        assert!(matches!(
            lifecycle.reveal(&id).await,
            Err(LifecycleError::InvalidState { .. })
        ));
        assert!(matches!(
            lifecycle.destroy(&id).await,
            Err(LifecycleError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn cleanup_removes_key_and_blob() {
        let (lifecycle, vault, stakes) = lifecycle();
        let id = CommitmentId::generate();
        lifecycle.seal(&id, b"shown once", StakeKind::ImageSymbol).await.unwrap();
        lifecycle.reveal(&id).await.unwrap();

        let report = lifecycle.cleanup(&id).await.unwrap();
        assert!(report.blob_removed);
        assert!(vault.is_empty());
        assert!(stakes.is_empty());
        assert_eq!(
            lifecycle.state(&id).await,
            StakeState::Destroyed(DestroyReason::Finalized)
        );

        assert!(matches!(
            lifecycle.reveal(&id).await,
            Err(LifecycleError::AlreadyResolved {
                reason: DestroyReason::Finalized,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn cleanup_requires_reveal() {
        let (lifecycle, vault, _) = lifecycle();
        let id = CommitmentId::generate();
        lifecycle.seal(&id, b"x", StakeKind::TextVow).await.unwrap();

        assert!(matches!(
            lifecycle.cleanup(&id).await,
            Err(LifecycleError::InvalidState {
                expected: StakeState::RevealedPendingCleanup,
                found: StakeState::Sealed,
                ..
            })
        ));
        assert_eq!(vault.len(), 1);
    }

    #[tokio::test]
    async fn destroy_is_final() {
        let (lifecycle, vault, stakes) = lifecycle();
        let id = CommitmentId::generate();
        lifecycle.seal(&id, b"gone", StakeKind::TextVow).await.unwrap();

        let report = lifecycle.destroy(&id).await.unwrap();
        assert!(report.blob_removed);
        assert!(matches!(
            vault.retrieve(&id).await,
            Err(nomos_storage::StorageError::KeyNotFound(_))
        ));
        assert!(stakes.is_empty());

        assert!(matches!(
            lifecycle.destroy(&id).await,
            Err(LifecycleError::AlreadyResolved { .. })
        ));
        assert!(matches!(
            lifecycle.seal(&id, b"again", StakeKind::TextVow).await,
            Err(LifecycleError::AlreadyResolved { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_ids_have_nothing_to_resolve() {
        let (lifecycle, _, _) = lifecycle();
        let id = CommitmentId::generate();

        assert!(matches!(
            lifecycle.reveal(&id).await,
            Err(LifecycleError::KeyNotFound(_))
        ));
        assert!(matches!(
            lifecycle.destroy(&id).await,
            Err(LifecycleError::KeyNotFound(_))
        ));
        assert_eq!(lifecycle.state(&id).await, StakeState::Unsealed);
    }

    #[tokio::test]
    async fn stakes_sealed_by_another_instance_can_be_resolved() {
        let vault = Arc::new(InMemoryKeyVault::new());
        let stakes = Arc::new(InMemoryStakeStore::new());
        let id = CommitmentId::generate();

        StakeLifecycle::new(vault.clone(), stakes.clone())
            .seal(&id, b"survives restart", StakeKind::TextVow)
            .await
            .unwrap();

        let restarted = StakeLifecycle::new(vault.clone(), stakes.clone());
        assert_eq!(restarted.state(&id).await, StakeState::Unsealed);
        restarted.destroy(&id).await.unwrap();
        assert!(vault.is_empty());
    }

    #[tokio::test]
    async fn blob_swapped_between_ids_fails_authentication() {
        let (lifecycle, _, stakes) = lifecycle();
        let a = CommitmentId::generate();
        let b = CommitmentId::generate();
        lifecycle.seal(&a, b"for a", StakeKind::TextVow).await.unwrap();
        lifecycle.seal(&b, b"for b", StakeKind::TextVow).await.unwrap();

        let blob_a = stakes.read(&a).await.unwrap();
        stakes.delete(&b).await.unwrap();
        stakes.write(&b, &blob_a).await.unwrap();

        assert!(matches!(
            lifecycle.reveal(&b).await,
            Err(LifecycleError::AuthenticationFailure(_))
        ));
        // Still destroyable after a failed reveal.
        lifecycle.destroy(&b).await.unwrap();
    }

    #[tokio::test]
    async fn misses_on_unknown_ids_leave_no_slots() {
        let (lifecycle, _, _) = lifecycle();
        for _ in 0..100 {
            let _ = lifecycle.reveal(&CommitmentId::generate()).await;
            let _ = lifecycle.destroy(&CommitmentId::generate()).await;
            let _ = lifecycle.cleanup(&CommitmentId::generate()).await;
        }
        assert_eq!(lifecycle.inner.slots.len(), 0);
    }

    #[tokio::test]
    async fn slots_track_only_live_and_resolved_ids() {
        let (lifecycle, _, _) = lifecycle();
        let discarded = CommitmentId::generate();
        let sealed = CommitmentId::generate();
        let destroyed = CommitmentId::generate();

        lifecycle.seal(&discarded, b"a", StakeKind::TextVow).await.unwrap();
        lifecycle.discard(&discarded).await.unwrap();
        lifecycle.seal(&sealed, b"b", StakeKind::TextVow).await.unwrap();
        lifecycle.seal(&destroyed, b"c", StakeKind::TextVow).await.unwrap();
        lifecycle.destroy(&destroyed).await.unwrap();

        assert_eq!(lifecycle.inner.slots.len(), 2);
        assert!(!lifecycle.inner.slots.contains_key(&discarded));
        assert!(matches!(
            lifecycle.reveal(&destroyed).await,
            Err(LifecycleError::AlreadyResolved { .. })
        ));
    }

    #[tokio::test]
    async fn discard_returns_id_to_unsealed() {
        let (lifecycle, vault, stakes) = lifecycle();
        let id = CommitmentId::generate();
        lifecycle.seal(&id, b"temp", StakeKind::TextVow).await.unwrap();

        lifecycle.discard(&id).await.unwrap();
        assert_eq!(lifecycle.state(&id).await, StakeState::Unsealed);
        assert!(vault.is_empty());
        assert!(stakes.is_empty());
    }
}
