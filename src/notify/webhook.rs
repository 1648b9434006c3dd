//! Alerts POSTed as JSON to a webhook.
//!
//! The payload carries a human-readable `text` field, which chat services such
//! as Slack and Mattermost render directly, plus structured fields.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;

use super::{Notifier, NotifyError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    event: &'a str,
    service: &'a str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    consecutive_failures: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    downtime_checks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    timestamp: DateTime<Utc>,
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(url: Url) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, url })
    }

    async fn post(&self, payload: &WebhookPayload<'_>) -> Result<(), NotifyError> {
        let response = self.client.post(self.url.clone()).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify_down(
        &self,
        service: &str,
        consecutive_failures: u32,
        last_error: Option<&str>,
    ) -> Result<(), NotifyError> {
        let text = format!(
            "🔴 {} is DOWN ({} consecutive failures): {}",
            service,
            consecutive_failures,
            last_error.unwrap_or("unknown error")
        );
        self.post(&WebhookPayload {
            event: "down",
            service,
            text,
            consecutive_failures: Some(consecutive_failures),
            downtime_checks: None,
            error: last_error,
            timestamp: Utc::now(),
        })
        .await
    }

    async fn notify_up(&self, service: &str, downtime_checks: u32) -> Result<(), NotifyError> {
        let text = format!(
            "🟢 {} is back UP after {} failed checks",
            service, downtime_checks
        );
        self.post(&WebhookPayload {
            event: "up",
            service,
            text,
            consecutive_failures: None,
            downtime_checks: Some(downtime_checks),
            error: None,
            timestamp: Utc::now(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<Value>>>;

    async fn spawn_receiver(reply: StatusCode) -> (Url, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    move |State(received): State<Received>, Json(body): Json<Value>| async move {
                        received.lock().unwrap().push(body);
                        reply
                    },
                ),
            )
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = Url::parse(&format!("http://{}/hook", addr)).unwrap();
        (url, received)
    }

    #[tokio::test]
    async fn test_down_and_up_payloads() {
        let (url, received) = spawn_receiver(StatusCode::OK).await;
        let notifier = WebhookNotifier::new(url).unwrap();

        notifier.notify_down("billing", 3, Some("Timeout after 5000ms")).await.unwrap();
        notifier.notify_up("billing", 5).await.unwrap();

        let bodies = received.lock().unwrap().clone();
        assert_eq!(bodies.len(), 2);

        assert_eq!(bodies[0]["event"], "down");
        assert_eq!(bodies[0]["service"], "billing");
        assert_eq!(bodies[0]["consecutiveFailures"], 3);
        assert_eq!(bodies[0]["error"], "Timeout after 5000ms");
        assert!(bodies[0]["text"].as_str().unwrap().contains("DOWN"));

        assert_eq!(bodies[1]["event"], "up");
        assert_eq!(bodies[1]["downtimeChecks"], 5);
        assert!(bodies[1].get("error").is_none());
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let (url, _received) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
        let notifier = WebhookNotifier::new(url).unwrap();

        let err = notifier.notify_up("billing", 3).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(500)));
    }
}
