//! Scheduler module for running checks on a fixed interval.

mod retention;

pub use retention::*;

use crate::monitor::Monitor;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

/// Drives `Monitor::process_check` once per interval.
pub struct Scheduler {
    monitor: Arc<Monitor>,
    interval: Duration,
    stop: Mutex<Option<broadcast::Sender<()>>>,
}

impl Scheduler {
    pub fn new(monitor: Arc<Monitor>, interval: Duration) -> Self {
        Self {
            monitor,
            interval,
            stop: Mutex::new(None),
        }
    }

    /// Start the check loop. Calling it again while running is a no-op.
    pub async fn start(&self) -> Option<JoinHandle<()>> {
        let mut stop = self.stop.lock().await;
        if stop.is_some() {
            return None;
        }

        let (tx, rx) = broadcast::channel(1);
        *stop = Some(tx);

        tracing::info!(
            "Scheduler: checking {} every {:?}",
            self.monitor.service_name(),
            self.interval
        );

        Some(tokio::spawn(run_check_loop(
            self.monitor.clone(),
            self.interval,
            rx,
        )))
    }

    /// Stop the check loop after any in-flight check finishes.
    pub async fn stop(&self) {
        if let Some(tx) = self.stop.lock().await.take() {
            let _ = tx.send(());
            tracing::info!("Scheduler: stopped");
        }
    }
}

/// One check at a time: the next tick is only considered after the previous
/// check has been recorded.
async fn run_check_loop(
    monitor: Arc<Monitor>,
    interval: Duration,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = ticker.tick() => {
                match monitor.process_check().await {
                    Ok(record) => tracing::debug!(
                        "Scheduler: {} check finished (up={}, failures={})",
                        monitor.service_name(),
                        record.up,
                        record.consecutive_failures
                    ),
                    Err(e) => tracing::error!(
                        "Scheduler: check for {} failed: {}",
                        monitor.service_name(),
                        e
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbError, ProbeRecord, ProbeStore, SqliteStore};
    use crate::monitor::testing::{RecordingNotifier, ScriptedProber};
    use crate::notify::Notifier;
    use crate::probe::ProbeOutcome;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Rejects the first save, then behaves like the wrapped store.
    struct FlakyStore {
        inner: SqliteStore,
        failed: AtomicBool,
    }

    #[async_trait]
    impl ProbeStore for FlakyStore {
        async fn save(&self, record: &ProbeRecord) -> Result<(), DbError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(DbError::Poisoned);
            }
            self.inner.save(record).await
        }

        async fn most_recent(&self, n: usize) -> Result<Vec<ProbeRecord>, DbError> {
            self.inner.most_recent(n).await
        }

        async fn records_in_range(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<ProbeRecord>, DbError> {
            self.inner.records_in_range(start, end).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_checks_until_stopped() {
        let store = Arc::new(SqliteStore::new(":memory:").unwrap());
        let recorder = Arc::new(RecordingNotifier::default());
        let outcomes = vec![ProbeOutcome::down(10, "x", None); 2];
        let monitor = Arc::new(Monitor::new(
            "api",
            2,
            Arc::new(ScriptedProber::new(outcomes)),
            store.clone(),
            vec![recorder.clone() as Arc<dyn Notifier>],
        ));

        let scheduler = Scheduler::new(monitor, Duration::from_secs(60));
        let handle = scheduler.start().await.unwrap();
        assert!(scheduler.start().await.is_none());

        // First tick fires immediately, then once per interval.
        tokio::time::sleep(Duration::from_secs(150)).await;
        scheduler.stop().await;
        handle.await.unwrap();

        let records = store.most_recent(10).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].up);
        assert_eq!(recorder.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_failed_save() {
        let store = Arc::new(FlakyStore {
            inner: SqliteStore::new(":memory:").unwrap(),
            failed: AtomicBool::new(false),
        });
        let monitor = Arc::new(Monitor::new(
            "api",
            2,
            Arc::new(ScriptedProber::default()),
            store.clone(),
            Vec::new(),
        ));

        let scheduler = Scheduler::new(monitor, Duration::from_secs(60));
        let handle = scheduler.start().await.unwrap();

        tokio::time::sleep(Duration::from_secs(150)).await;
        scheduler.stop().await;
        handle.await.unwrap();

        // The first tick's save failed; the two after it were recorded.
        let records = store.most_recent(10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.up && r.consecutive_failures == 0));
    }
}
