//! Eviction of idle participants.
//!
//! The sweeper periodically scans the room and removes every participant
//! whose last heartbeat is older than the staleness threshold, broadcasting
//! a leave notice for each.
//!
//! Sweeps run inline in the scheduling loop, so two sweeps never overlap.
//! Ticks that come due while a sweep is still running are skipped.

use crate::error::ChatError;
use crate::message::{now_millis, Message};
use crate::presence::Participant;
use crate::room::Room;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shortest accepted interval between sweeps.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Idle time after which a participant is evicted.
    pub stale_after: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(15_000),
            stale_after: Duration::from_millis(10_000),
        }
    }
}

/// Outcome of a single sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Participants examined.
    pub scanned: usize,
    /// Names evicted by this sweep.
    pub evicted: Vec<String>,
    /// Candidates whose eviction failed.
    pub failed: usize,
    /// Wall-clock time spent sweeping.
    pub elapsed: Duration,
}

type Observer = Box<dyn Fn(&Result<SweepReport, ChatError>) + Send + Sync>;

/// Recurring eviction task.
pub struct Sweeper {
    room: Room,
    config: SweeperConfig,
    observer: Option<Observer>,
}

impl Sweeper {
    /// Create a sweeper for `room`.
    ///
    /// Intervals shorter than [`MIN_SWEEP_INTERVAL`] (including zero) are
    /// raised to it.
    #[must_use]
    pub fn new(room: Room, mut config: SweeperConfig) -> Self {
        if config.interval < MIN_SWEEP_INTERVAL {
            warn!(
                interval_ms = millis(config.interval),
                min_ms = millis(MIN_SWEEP_INTERVAL),
                "Sweep interval too short, clamping"
            );
            config.interval = MIN_SWEEP_INTERVAL;
        }
        Self {
            room,
            config,
            observer: None,
        }
    }

    /// Call `observer` after every scheduled sweep.
    #[must_use]
    pub fn with_observer(
        mut self,
        observer: impl Fn(&Result<SweepReport, ChatError>) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// The sweeper configuration.
    #[must_use]
    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Run one sweep against the current time.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`] if the participant snapshot cannot be
    /// read. Failures on individual evictions are counted in the report.
    pub async fn sweep(&self) -> Result<SweepReport, ChatError> {
        self.sweep_at(now_millis()).await
    }

    /// Run one sweep as if the current time were `now` (ms since epoch).
    ///
    /// # Errors
    ///
    /// See [`Sweeper::sweep`].
    pub async fn sweep_at(&self, now: u64) -> Result<SweepReport, ChatError> {
        let start = Instant::now();
        let snapshot = self.room.participants().await?;
        let cutoff = now.saturating_sub(millis(self.config.stale_after));

        let mut report = SweepReport {
            scanned: snapshot.len(),
            ..SweepReport::default()
        };

        for participant in snapshot
            .iter()
            .filter(|p| p.is_stale(now, self.config.stale_after))
        {
            match self.evict(participant, cutoff).await {
                Ok(true) => report.evicted.push(participant.name.clone()),
                Ok(false) => {
                    debug!(participant = %participant.name, "Eviction skipped: heartbeat since snapshot");
                }
                Err(e) => {
                    warn!(participant = %participant.name, error = %e, "Eviction failed");
                    report.failed += 1;
                }
            }
        }

        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// Remove `participant` if it is still stale and broadcast its departure.
    ///
    /// If the leave notice cannot be written the participant is put back
    /// with its snapshot heartbeat, so the next sweep retries the eviction.
    async fn evict(&self, participant: &Participant, cutoff: u64) -> Result<bool, ChatError> {
        let name = participant.name.as_str();
        if !self.room.store.remove_stale_participant(name, cutoff).await? {
            return Ok(false);
        }
        if let Err(e) = self.room.store.append_message(Message::left(name)).await {
            match self.room.store.insert_participant(participant.clone()).await {
                Ok(true) => debug!(participant = %name, "Eviction rolled back"),
                Ok(false) => warn!(participant = %name, "Eviction rollback skipped: name rejoined"),
                Err(rollback) => {
                    error!(participant = %name, error = %rollback, "Eviction rollback failed");
                }
            }
            return Err(e.into());
        }
        info!(participant = %name, "Participant evicted");
        Ok(true)
    }

    /// Run sweeps on the configured interval until `token` is cancelled.
    ///
    /// The first sweep happens one interval after the call.
    pub async fn run(&self, token: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_ms = millis(self.config.interval),
            stale_after_ms = millis(self.config.stale_after),
            "Sweeper started"
        );

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => break,

                _ = ticker.tick() => {
                    let result = self.sweep().await;
                    match &result {
                        Ok(report) if !report.evicted.is_empty() || report.failed > 0 => {
                            info!(
                                scanned = report.scanned,
                                evicted = report.evicted.len(),
                                failed = report.failed,
                                "Sweep finished"
                            );
                        }
                        Ok(report) => debug!(scanned = report.scanned, "Sweep finished"),
                        Err(e) => error!(error = %e, "Sweep aborted"),
                    }
                    if let Some(observer) = &self.observer {
                        observer(&result);
                    }
                }
            }
        }

        info!("Sweeper stopped");
    }

    /// Spawn [`Sweeper::run`] onto the runtime.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(token).await })
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sweeper")
            .field("room", &self.room)
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageKind, BROADCAST, LEAVE_TEXT};
    use crate::router::MessageQuery;
    use crate::store::flaky::FlakyStore;
    use crate::store::{MemoryStore, Store, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NOW: u64 = 1_700_000_000_000;

    fn sweeper(store: Arc<dyn Store>) -> Sweeper {
        Sweeper::new(Room::new(store), SweeperConfig::default())
    }

    #[tokio::test]
    async fn test_sweep_evicts_stale() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_participant(Participant::with_heartbeat("ana", NOW - 10_001))
            .await
            .unwrap();
        store
            .insert_participant(Participant::with_heartbeat("bia", NOW - 10_000))
            .await
            .unwrap();
        store
            .insert_participant(Participant::with_heartbeat("caio", NOW - 500))
            .await
            .unwrap();

        let report = sweeper(store.clone()).sweep_at(NOW).await.unwrap();

        assert_eq!(report.scanned, 3);
        assert_eq!(report.evicted, vec!["ana".to_string()]);
        assert_eq!(report.failed, 0);

        let mut remaining: Vec<String> = store
            .participants()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec!["bia", "caio"]);

        let messages = store.messages(MessageQuery::default()).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from, "ana");
        assert_eq!(messages[0].to, BROADCAST);
        assert_eq!(messages[0].text, LEAVE_TEXT);
        assert_eq!(messages[0].kind, MessageKind::Status);
    }

    #[tokio::test]
    async fn test_sweep_empty_room() {
        let report = sweeper(Arc::new(MemoryStore::new())).sweep_at(NOW).await.unwrap();
        assert_eq!(report.scanned, 0);
        assert!(report.evicted.is_empty());
    }

    #[tokio::test]
    async fn test_joined_participant_survives_sweep() {
        let store = Arc::new(MemoryStore::new());
        let sweeper = sweeper(store.clone());
        sweeper.room.join("ana").await.unwrap();

        let report = sweeper.sweep().await.unwrap();
        assert!(report.evicted.is_empty());
        assert_eq!(store.participants().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_aborts_when_snapshot_fails() {
        let store = Arc::new(FlakyStore {
            fail_snapshot: true,
            ..FlakyStore::default()
        });

        let result = sweeper(store).sweep_at(NOW).await;
        assert!(matches!(result, Err(ChatError::Store(StoreError::Unavailable(_)))));
    }

    #[tokio::test]
    async fn test_sweep_continues_past_failed_eviction() {
        let store = Arc::new(FlakyStore {
            fail_remove_for: Some("ana"),
            ..FlakyStore::default()
        });
        for name in ["ana", "bia"] {
            store
                .insert_participant(Participant::with_heartbeat(name, 0))
                .await
                .unwrap();
        }

        let report = sweeper(store.clone()).sweep_at(NOW).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.evicted, vec!["bia".to_string()]);
        let remaining = store.participants().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "ana");
    }

    #[tokio::test]
    async fn test_heartbeat_after_snapshot_prevents_eviction() {
        let store = Arc::new(FlakyStore {
            touch_after_snapshot: Some(("ana", NOW)),
            ..FlakyStore::default()
        });
        store
            .insert_participant(Participant::with_heartbeat("ana", 0))
            .await
            .unwrap();

        let report = sweeper(store.clone()).sweep_at(NOW).await.unwrap();

        assert_eq!(report.scanned, 1);
        assert!(report.evicted.is_empty());
        assert_eq!(report.failed, 0);
        let ana = store.find_participant("ana").await.unwrap().unwrap();
        assert_eq!(ana.last_heartbeat, NOW);
        assert!(store.messages(MessageQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_leave_notice_restores_participant() {
        let store = Arc::new(FlakyStore::default());
        store
            .insert_participant(Participant::with_heartbeat("ana", 0))
            .await
            .unwrap();
        store.set_fail_append(true);
        let sweeper = sweeper(store.clone());

        let report = sweeper.sweep_at(NOW).await.unwrap();

        assert!(report.evicted.is_empty());
        assert_eq!(report.failed, 1);
        let ana = store.find_participant("ana").await.unwrap().unwrap();
        assert_eq!(ana.last_heartbeat, 0);
        assert!(store.messages(MessageQuery::default()).await.unwrap().is_empty());

        store.set_fail_append(false);
        let report = sweeper.sweep_at(NOW).await.unwrap();

        assert_eq!(report.evicted, vec!["ana".to_string()]);
        assert!(store.participants().await.unwrap().is_empty());
        let messages = store.messages(MessageQuery::default()).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, LEAVE_TEXT);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = SweeperConfig {
            interval: Duration::ZERO,
            ..SweeperConfig::default()
        };
        let sweeper = Sweeper::new(Room::new(Arc::new(MemoryStore::new())), config);
        assert_eq!(sweeper.config().interval, MIN_SWEEP_INTERVAL);
        assert_eq!(sweeper.config().stale_after, SweeperConfig::default().stale_after);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_runs_without_panicking() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let config = SweeperConfig {
            interval: Duration::ZERO,
            ..SweeperConfig::default()
        };
        let sweeper = Arc::new(
            Sweeper::new(Room::new(Arc::new(MemoryStore::new())), config).with_observer(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let token = CancellationToken::new();
        let handle = sweeper.spawn(token.clone());

        time::sleep(MIN_SWEEP_INTERVAL * 3 + Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_sweeps_until_cancelled() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let sweeper = Arc::new(
            sweeper(Arc::new(MemoryStore::new())).with_observer(move |result| {
                assert!(result.is_ok());
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let token = CancellationToken::new();
        let handle = sweeper.clone().spawn(token.clone());

        time::sleep(Duration::from_millis(14_000)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_millis(30_000)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        token.cancel();
        handle.await.unwrap();

        time::sleep(Duration::from_millis(60_000)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
