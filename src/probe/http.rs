//! HTTP probe implementation.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use std::time::{Duration, Instant};

use super::{ProbeError, ProbeOutcome, Prober, StatusMatcher};
use crate::config::TargetConfig;

/// Probes the configured endpoint with one reusable client.
pub struct HttpProber {
    client: reqwest::Client,
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: Option<String>,
    expected_status: StatusMatcher,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(target: &TargetConfig) -> Result<Self, ProbeError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &target.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProbeError::Config(format!("header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ProbeError::Config(format!("header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        // The deadline is enforced around the whole exchange in `check`.
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: target.url.clone(),
            method: target.method.clone(),
            headers,
            body: target.body.clone(),
            expected_status: target.expected_status.clone(),
            timeout: target.timeout,
        })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn check(&self) -> Result<ProbeOutcome, ProbeError> {
        let mut request = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }

        let start = Instant::now();

        // Read the full body to measure complete transfer time
        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map(|_| ());
            Ok::<_, reqwest::Error>((status, body))
        };

        let outcome = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok((status, Ok(())))) => {
                let elapsed = elapsed_ms(start);
                if self.expected_status.matches(status) {
                    ProbeOutcome::up(elapsed, status)
                } else {
                    ProbeOutcome::down(
                        elapsed,
                        format!("Unexpected status code: {}", status),
                        Some(status),
                    )
                }
            }
            Ok(Ok((status, Err(e)))) => {
                ProbeOutcome::down(elapsed_ms(start), e.to_string(), Some(status))
            }
            Ok(Err(e)) => ProbeOutcome::down(
                elapsed_ms(start),
                e.to_string(),
                e.status().map(|s| s.as_u16()),
            ),
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                ProbeOutcome::down(timeout_ms, format!("Timeout after {}ms", timeout_ms), None)
            }
        };

        tracing::debug!(
            url = %self.url,
            up = outcome.up,
            response_time = outcome.response_time,
            status = ?outcome.status_code,
            "probe finished"
        );

        Ok(outcome)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
