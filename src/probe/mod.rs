//! Probe module for endpoint monitoring.
//!
//! A probe failure (timeout, refused connection, wrong status) is an ordinary
//! outcome with `up == false`. `ProbeError` is for the prober itself being broken.

mod http;
mod status;

pub use http::*;
pub use status::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("http client error: {0}")]
    Client(String),
}

/// Result of one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    pub up: bool,
    /// Milliseconds spent on the attempt.
    pub response_time: u64,
    pub err: Option<String>,
    pub status_code: Option<u16>,
}

impl ProbeOutcome {
    pub fn up(response_time: u64, status_code: u16) -> Self {
        Self {
            up: true,
            response_time,
            err: None,
            status_code: Some(status_code),
        }
    }

    pub fn down(response_time: u64, err: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            up: false,
            response_time,
            err: Some(err.into()),
            status_code,
        }
    }
}

/// Something that can check the monitored endpoint once.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn check(&self) -> Result<ProbeOutcome, ProbeError>;
}
