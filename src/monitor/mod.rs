//! Monitoring service: runs one check end to end and answers stats queries.

mod grace;
mod stats;

pub use grace::*;
pub use stats::*;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::db::{DbError, ProbeRecord, ProbeStore};
use crate::notify::Notifier;
use crate::probe::{ProbeError, Prober};

/// Monitor error types.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("store error: {0}")]
    Store(#[from] DbError),
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),
}

/// Composes prober, store and notifiers around the grace-period rules.
pub struct Monitor {
    service_name: String,
    grace_period: u32,
    prober: Arc<dyn Prober>,
    store: Arc<dyn ProbeStore>,
    notifiers: Vec<Arc<dyn Notifier>>,
    /// Held for a whole check so the next one always reads this one's counter.
    check_lock: Mutex<()>,
}

impl Monitor {
    pub fn new(
        service_name: impl Into<String>,
        grace_period: u32,
        prober: Arc<dyn Prober>,
        store: Arc<dyn ProbeStore>,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            grace_period,
            prober,
            store,
            notifiers,
            check_lock: Mutex::new(()),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn grace_period(&self) -> u32 {
        self.grace_period
    }

    /// Probe once, persist the outcome and send any alert it triggers.
    pub async fn process_check(&self) -> Result<ProbeRecord, MonitorError> {
        let _guard = self.check_lock.lock().await;

        let checked_at = Utc::now();
        let outcome = self.prober.check().await?;

        let previous = self
            .store
            .most_recent(1)
            .await?
            .first()
            .map(|r| r.consecutive_failures)
            .unwrap_or(0);

        let transition = advance(previous, &outcome, self.grace_period);
        let last_error = outcome.err.clone();
        let record =
            ProbeRecord::from_outcome(checked_at, outcome, transition.consecutive_failures);

        self.store.save(&record).await?;

        match transition.state(self.grace_period) {
            HealthState::Healthy => {
                tracing::debug!(service = %self.service_name, "check recorded: healthy")
            }
            HealthState::Degraded { failures, alerted } => tracing::debug!(
                service = %self.service_name,
                failures,
                alerted,
                "check recorded: degraded"
            ),
        }

        match transition.action {
            Action::NotifyDown => {
                tracing::warn!(
                    service = %self.service_name,
                    failures = transition.consecutive_failures,
                    "service crossed grace period, sending down alerts"
                );
                self.notify_down(transition.consecutive_failures, last_error.as_deref())
                    .await;
            }
            Action::NotifyUp => {
                tracing::info!(
                    service = %self.service_name,
                    downtime_checks = previous,
                    "service recovered, sending up alerts"
                );
                self.notify_up(previous).await;
            }
            Action::None => {}
        }

        Ok(record)
    }

    /// Stats over `[start, end]`; defaults to the last 24 hours.
    ///
    /// A window with no checks in it, reversed bounds included, yields `Stats::empty()`.
    pub async fn get_stats(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Stats, MonitorError> {
        let now = Utc::now();
        let end = end.unwrap_or(now);
        let start = start.unwrap_or_else(|| now - ChronoDuration::hours(24));

        let records = self.store.records_in_range(start, end).await?;
        Ok(compute(records, now))
    }

    /// The latest `limit` checks, most recent first.
    pub async fn recent_checks(&self, limit: usize) -> Result<Vec<ProbeRecord>, MonitorError> {
        Ok(self.store.most_recent(limit).await?)
    }

    async fn notify_down(&self, failures: u32, last_error: Option<&str>) {
        for notifier in &self.notifiers {
            if let Err(e) = notifier
                .notify_down(&self.service_name, failures, last_error)
                .await
            {
                tracing::error!(
                    "Monitor: {} notifier failed to send down alert: {}",
                    notifier.name(),
                    e
                );
            }
        }
    }

    async fn notify_up(&self, downtime_checks: u32) {
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify_up(&self.service_name, downtime_checks).await {
                tracing::error!(
                    "Monitor: {} notifier failed to send up alert: {}",
                    notifier.name(),
                    e
                );
            }
        }
    }
}
