//! Retention manager for cleaning up old checks.

use crate::db::SqliteStore;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Manager for deleting checks past the retention age.
pub struct RetentionManager {
    store: Arc<SqliteStore>,
    max_age: Duration,
    stop: Mutex<Option<broadcast::Sender<()>>>,
}

impl RetentionManager {
    pub fn new(store: Arc<SqliteStore>, max_age: Duration) -> Self {
        Self {
            store,
            max_age,
            stop: Mutex::new(None),
        }
    }

    /// Start the retention manager background task. A second call is a no-op.
    pub async fn start(&self) -> Option<JoinHandle<()>> {
        let mut stop = self.stop.lock().await;
        if stop.is_some() {
            return None;
        }

        let (tx, mut rx) = broadcast::channel(1);
        *stop = Some(tx);

        let store = self.store.clone();
        let max_age = self.max_age;

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        process_retention(&store, max_age);
                    }
                }
            }
        }))
    }

    /// Stop the retention manager.
    pub async fn stop(&self) {
        if let Some(tx) = self.stop.lock().await.take() {
            let _ = tx.send(());
        }
    }
}

fn process_retention(store: &SqliteStore, max_age: Duration) -> usize {
    let age = match ChronoDuration::from_std(max_age) {
        Ok(age) => age,
        Err(e) => {
            tracing::error!("RetentionManager: retention age out of range: {}", e);
            return 0;
        }
    };
    let cutoff = Utc::now() - age;

    match store.delete_records_before(cutoff) {
        Ok(removed) => {
            if removed > 0 {
                tracing::info!(
                    "RetentionManager: Deleted {} checks older than {}",
                    removed,
                    cutoff
                );
            }
            removed
        }
        Err(e) => {
            tracing::error!("RetentionManager: Failed to delete old checks: {}", e);
            0
        }
    }
}
