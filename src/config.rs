//! Configuration module for gracewatch.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unlike the server settings, the monitored target has no usable default, so a
//! missing or malformed value is a hard error at startup.

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use reqwest::{Method, Url};
use thiserror::Error;

use crate::probe::StatusMatcher;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the query API (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "gracewatch.db")
    pub db_path: String,
    /// Bearer token required on `/api/*` when set
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "gracewatch.db".to_string(),
            api_token: None,
        }
    }
}

/// The endpoint being monitored and how to probe it.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub service_name: String,
    pub url: Url,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub expected_status: StatusMatcher,
    pub timeout: Duration,
    pub interval: Duration,
}

impl TargetConfig {
    /// Target with default probe settings.
    pub fn new(url: Url) -> Self {
        let service_name = url.host_str().unwrap_or("service").to_string();
        Self {
            service_name,
            url,
            method: Method::GET,
            headers: Vec::new(),
            body: None,
            expected_status: StatusMatcher::default(),
            timeout: Duration::from_millis(5000),
            interval: Duration::from_secs(60),
        }
    }
}

/// Alerting configuration.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Consecutive failures before a down alert fires.
    pub grace_period: u32,
    pub webhook_url: Option<Url>,
    pub console: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            grace_period: 3,
            webhook_url: None,
            console: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub target: TargetConfig,
    pub alerts: AlertConfig,
    /// Age past which checks are deleted; `None` keeps everything.
    pub retention: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `GRACEWATCH_TARGET_URL`: URL to probe (required)
    /// - `GRACEWATCH_SERVICE_NAME`: name used in alerts (default: URL host)
    /// - `GRACEWATCH_METHOD`: HTTP method (default: GET)
    /// - `GRACEWATCH_HEADERS`: JSON object of request headers
    /// - `GRACEWATCH_BODY`: request body
    /// - `GRACEWATCH_EXPECTED_STATUS`: codes and ranges (default: "200")
    /// - `GRACEWATCH_TIMEOUT_MS`: probe timeout (default: 5000)
    /// - `GRACEWATCH_INTERVAL_SECS`: check interval (default: 60)
    /// - `GRACEWATCH_GRACE_PERIOD`: failures before alerting (default: 3)
    /// - `GRACEWATCH_WEBHOOK_URL`: webhook notifier endpoint
    /// - `GRACEWATCH_CONSOLE_ALERTS`: log alerts to the console (default: true)
    /// - `GRACEWATCH_RETENTION_DAYS`: history kept, 0 disables (default: 30)
    /// - `GRACEWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `GRACEWATCH_DB_PATH`: database file path (default: "gracewatch.db")
    /// - `GRACEWATCH_API_TOKEN`: bearer token for the API
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut server = ServerConfig::default();
        if let Some(port) = get("GRACEWATCH_HTTP_PORT") {
            server.http_port = parse_num("GRACEWATCH_HTTP_PORT", &port)?;
        }
        if let Some(db_path) = get("GRACEWATCH_DB_PATH") {
            server.db_path = db_path;
        }
        server.api_token = get("GRACEWATCH_API_TOKEN");

        let raw_url =
            get("GRACEWATCH_TARGET_URL").ok_or(ConfigError::Missing("GRACEWATCH_TARGET_URL"))?;
        let mut target = TargetConfig::new(parse_http_url("GRACEWATCH_TARGET_URL", &raw_url)?);

        if let Some(name) = get("GRACEWATCH_SERVICE_NAME") {
            target.service_name = name;
        }
        if let Some(method) = get("GRACEWATCH_METHOD") {
            target.method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|e| {
                ConfigError::Invalid {
                    key: "GRACEWATCH_METHOD",
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(headers) = get("GRACEWATCH_HEADERS") {
            let map: BTreeMap<String, String> =
                serde_json::from_str(&headers).map_err(|e| ConfigError::Invalid {
                    key: "GRACEWATCH_HEADERS",
                    reason: e.to_string(),
                })?;
            target.headers = map.into_iter().collect();
        }
        target.body = lookup("GRACEWATCH_BODY").filter(|b| !b.is_empty());
        if let Some(expected) = get("GRACEWATCH_EXPECTED_STATUS") {
            target.expected_status =
                StatusMatcher::parse(&expected).map_err(|e| ConfigError::Invalid {
                    key: "GRACEWATCH_EXPECTED_STATUS",
                    reason: e.to_string(),
                })?;
        }
        if let Some(ms) = get("GRACEWATCH_TIMEOUT_MS") {
            let ms: u64 = parse_positive("GRACEWATCH_TIMEOUT_MS", &ms)?;
            target.timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = get("GRACEWATCH_INTERVAL_SECS") {
            let secs: u64 = parse_positive("GRACEWATCH_INTERVAL_SECS", &secs)?;
            target.interval = Duration::from_secs(secs);
        }

        let mut alerts = AlertConfig::default();
        if let Some(grace) = get("GRACEWATCH_GRACE_PERIOD") {
            alerts.grace_period = parse_positive("GRACEWATCH_GRACE_PERIOD", &grace)?;
        }
        if let Some(url) = get("GRACEWATCH_WEBHOOK_URL") {
            alerts.webhook_url = Some(parse_http_url("GRACEWATCH_WEBHOOK_URL", &url)?);
        }
        if let Some(console) = get("GRACEWATCH_CONSOLE_ALERTS") {
            alerts.console = parse_bool("GRACEWATCH_CONSOLE_ALERTS", &console)?;
        }

        let retention_days: u64 = match get("GRACEWATCH_RETENTION_DAYS") {
            Some(days) => parse_num("GRACEWATCH_RETENTION_DAYS", &days)?,
            None => 30,
        };
        let retention = (retention_days > 0).then(|| Duration::from_secs(retention_days * 86_400));

        Ok(Self {
            server,
            target,
            alerts,
            retention,
        })
    }
}

fn parse_num<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_positive<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let n: T = parse_num(key, value)?;
    if n <= T::default() {
        return Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(n)
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got {:?}", other),
        }),
    }
}

fn parse_http_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("unsupported scheme {:?}", url.scheme()),
        });
    }
    Ok(url)
}
