//! Alert delivery channels.

mod console;
mod webhook;

pub use console::*;
pub use webhook::*;

use async_trait::async_trait;
use thiserror::Error;

/// Notification error types.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint rejected notification with status {0}")]
    Rejected(u16),
}

/// A channel that can announce outages and recoveries.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn notify_down(
        &self,
        service: &str,
        consecutive_failures: u32,
        last_error: Option<&str>,
    ) -> Result<(), NotifyError>;

    /// `downtime_checks` is the number of failed checks the outage lasted.
    async fn notify_up(&self, service: &str, downtime_checks: u32) -> Result<(), NotifyError>;
}
