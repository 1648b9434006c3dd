//! Alerts written to the process log.

use async_trait::async_trait;

use super::{Notifier, NotifyError};

#[derive(Debug, Default, Clone)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    async fn notify_down(
        &self,
        service: &str,
        consecutive_failures: u32,
        last_error: Option<&str>,
    ) -> Result<(), NotifyError> {
        tracing::warn!(
            service,
            consecutive_failures,
            error = last_error.unwrap_or("unknown error"),
            "ALERT: {} is DOWN",
            service
        );
        Ok(())
    }

    async fn notify_up(&self, service: &str, downtime_checks: u32) -> Result<(), NotifyError> {
        tracing::info!(
            service,
            downtime_checks,
            "RECOVERED: {} is back UP after {} failed checks",
            service,
            downtime_checks
        );
        Ok(())
    }
}
