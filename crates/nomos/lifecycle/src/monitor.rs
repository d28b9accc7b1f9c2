//! Deadline monitor
//!
//! Polls the commitment store and announces, once per commitment, that an
//! unresolved commitment has passed its deadline and needs a verdict.

use chrono::{DateTime, Utc};
use nomos_storage::{CommitmentStore, StorageResult};
use nomos_types::CommitmentId;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};

use crate::config::MonitorConfig;

/// Signal that a commitment expired unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictRequired {
    pub commitment_id: CommitmentId,
    pub rule: String,
    pub expired_at: DateTime<Utc>,
}

/// Expiry watcher
pub struct DeadlineMonitor {
    config: MonitorConfig,
    commitments: Arc<dyn CommitmentStore>,
    signaled: Mutex<HashSet<CommitmentId>>,
    verdict_tx: broadcast::Sender<VerdictRequired>,
    check_tx: mpsc::Sender<()>,
    running: Arc<RwLock<bool>>,
    stopped: AtomicBool,
}

impl DeadlineMonitor {
    /// Create a new monitor. Pass the receiver to [`DeadlineMonitor::start`].
    pub fn new(
        config: MonitorConfig,
        commitments: Arc<dyn CommitmentStore>,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (check_tx, check_rx) = mpsc::channel(10);
        let (verdict_tx, _) = broadcast::channel(config.channel_capacity.max(1));

        let monitor = Arc::new(Self {
            config,
            commitments,
            signaled: Mutex::new(HashSet::new()),
            verdict_tx,
            check_tx,
            running: Arc::new(RwLock::new(false)),
            stopped: AtomicBool::new(false),
        });

        (monitor, check_rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VerdictRequired> {
        self.verdict_tx.subscribe()
    }

    /// Trigger an immediate check
    pub async fn trigger_check(&self) {
        let _ = self.check_tx.send(()).await;
    }

    /// Check once against `now`, returning the newly signalled commitments.
    pub async fn check_at(&self, now: DateTime<Utc>) -> StorageResult<Vec<VerdictRequired>> {
        let commitments = self.commitments.list().await?;
        let mut signaled = self.signaled.lock().await;

        // Forget ids that resolved or disappeared.
        let unresolved: HashSet<CommitmentId> = commitments
            .iter()
            .filter(|c| !c.is_resolved())
            .map(|c| c.id)
            .collect();
        signaled.retain(|id| unresolved.contains(id));

        let mut fresh = Vec::new();
        for commitment in commitments
            .into_iter()
            .filter(|c| !c.is_resolved() && c.has_expired_at(now))
        {
            if !signaled.insert(commitment.id) {
                continue;
            }

            tracing::info!(
                commitment_id = %commitment.id,
                expired_at = %commitment.expires_at,
                "Verdict required"
            );

            let signal = VerdictRequired {
                commitment_id: commitment.id,
                rule: commitment.rule,
                expired_at: commitment.expires_at,
            };
            // No subscribers is fine; the return value still reports it.
            let _ = self.verdict_tx.send(signal.clone());
            fresh.push(signal);
        }

        Ok(fresh)
    }

    /// Run the polling loop until [`DeadlineMonitor::stop`] is called. A stop
    /// issued before the loop starts still ends it.
    pub async fn start(self: Arc<Self>, mut check_rx: mpsc::Receiver<()>) {
        {
            let mut running = self.running.write().await;
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            *running = true;
        }

        tracing::info!(
            poll_interval_secs = self.config.poll_interval_secs,
            "Deadline monitor started"
        );

        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                received = check_rx.recv() => {
                    if received.is_none() {
                        break;
                    }
                }
            }

            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            if let Err(e) = self.check_at(Utc::now()).await {
                tracing::error!(error = %e, "Deadline check failed");
            }
        }

        *self.running.write().await = false;
        tracing::info!("Deadline monitor stopped");
    }

    /// Stop the monitor
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            self.stopped.store(true, Ordering::SeqCst);
            *running = false;
        }
        let _ = self.check_tx.try_send(());
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use nomos_storage::memory::InMemoryCommitmentStore;
    use nomos_types::{Commitment, Resolution, StakeKind};

    fn expiring(store_now: DateTime<Utc>, secs: i64) -> Commitment {
        Commitment::starting_at(
            "no phone after ten",
            StakeKind::TextVow,
            ChronoDuration::seconds(secs),
            store_now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn signals_each_expired_commitment_once() {
        let store = Arc::new(InMemoryCommitmentStore::new());
        let now = Utc::now();
        let expired = expiring(now - ChronoDuration::hours(2), 60);
        let pending = expiring(now, 3600);
        store.save(&expired).await.unwrap();
        store.save(&pending).await.unwrap();

        let (monitor, _rx) = DeadlineMonitor::new(MonitorConfig::default(), store.clone());
        let mut verdicts = monitor.subscribe();

        let first = monitor.check_at(now).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].commitment_id, expired.id);
        assert_eq!(verdicts.recv().await.unwrap().commitment_id, expired.id);

        assert!(monitor.check_at(now).await.unwrap().is_empty());
        assert!(matches!(
            verdicts.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        let later = monitor
            .check_at(now + ChronoDuration::hours(2))
            .await
            .unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].commitment_id, pending.id);
    }

    #[tokio::test]
    async fn resolved_commitments_are_ignored() {
        let store = Arc::new(InMemoryCommitmentStore::new());
        let now = Utc::now();
        let mut done = expiring(now - ChronoDuration::hours(1), 1);
        done.resolve(Resolution::Upheld).unwrap();
        store.save(&done).await.unwrap();

        let (monitor, _rx) = DeadlineMonitor::new(MonitorConfig::default(), store);
        assert!(monitor.check_at(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn forgets_removed_commitments() {
        let store = Arc::new(InMemoryCommitmentStore::new());
        let now = Utc::now();
        let c = expiring(now - ChronoDuration::hours(1), 1);
        store.save(&c).await.unwrap();

        let (monitor, _rx) = DeadlineMonitor::new(MonitorConfig::default(), store.clone());
        assert_eq!(monitor.check_at(now).await.unwrap().len(), 1);

        store.delete(&c.id).await.unwrap();
        assert!(monitor.check_at(now).await.unwrap().is_empty());
        assert!(monitor.signaled.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_polls_and_stops() {
        let store = Arc::new(InMemoryCommitmentStore::new());
        let c = expiring(Utc::now() - ChronoDuration::hours(1), 1);
        store.save(&c).await.unwrap();

        let (monitor, rx) = DeadlineMonitor::new(
            MonitorConfig {
                poll_interval_secs: 60,
                channel_capacity: 8,
            },
            store,
        );
        let mut verdicts = monitor.subscribe();
        let handle = tokio::spawn(monitor.clone().start(rx));

        let signal = verdicts.recv().await.unwrap();
        assert_eq!(signal.commitment_id, c.id);
        assert!(monitor.is_running().await);

        monitor.stop().await;
        handle.await.unwrap();
        assert!(!monitor.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_checks_before_next_tick() {
        let store = Arc::new(InMemoryCommitmentStore::new());
        let first = expiring(Utc::now() - ChronoDuration::hours(1), 1);
        store.save(&first).await.unwrap();

        let (monitor, rx) = DeadlineMonitor::new(
            MonitorConfig {
                poll_interval_secs: 3600,
                channel_capacity: 8,
            },
            store.clone(),
        );
        let mut verdicts = monitor.subscribe();
        let started = tokio::time::Instant::now();
        let handle = tokio::spawn(monitor.clone().start(rx));

        // The immediate first tick picks up the first commitment.
        assert_eq!(verdicts.recv().await.unwrap().commitment_id, first.id);

        let second = expiring(Utc::now() - ChronoDuration::hours(1), 1);
        store.save(&second).await.unwrap();
        monitor.trigger_check().await;

        assert_eq!(verdicts.recv().await.unwrap().commitment_id, second.id);
        assert!(started.elapsed() < std::time::Duration::from_secs(3600));

        monitor.stop().await;
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_ends_the_loop() {
        let store = Arc::new(InMemoryCommitmentStore::new());
        let (monitor, rx) = DeadlineMonitor::new(MonitorConfig::default(), store);

        monitor.stop().await;
        let finished = tokio::time::timeout(
            std::time::Duration::from_secs(600),
            monitor.clone().start(rx),
        )
        .await;

        assert!(finished.is_ok());
        assert!(!monitor.is_running().await);
    }
}
