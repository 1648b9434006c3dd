//! HTTP request handlers.

use super::AppState;
use crate::db::ProbeRecord;
use crate::monitor::MonitorError;

use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_CHECKS_LIMIT: usize = 50;
const MAX_CHECKS_LIMIT: usize = 1000;

// ============================================================================
// Auth
// ============================================================================

/// Reject `/api/*` requests without the configured bearer token.
pub async fn require_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.config.server.api_token.as_deref() else {
        return next.run(req).await;
    };

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented != Some(expected) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    next.run(req).await
}

fn monitor_error(e: MonitorError) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

// ============================================================================
// Health
// ============================================================================

pub async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================================
// API: Stats
// ============================================================================

/// Epoch milliseconds, both optional.
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

fn parse_epoch(name: &str, ms: Option<i64>) -> Result<Option<DateTime<Utc>>, Response> {
    match ms {
        None => Ok(None),
        Some(ms) => DateTime::from_timestamp_millis(ms).map(Some).ok_or_else(|| {
            (StatusCode::BAD_REQUEST, format!("{} is out of range", name)).into_response()
        }),
    }
}

pub async fn handle_get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Response {
    let start = match parse_epoch("start", query.start) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let end = match parse_epoch("end", query.end) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match state.monitor.get_stats(start, end).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => monitor_error(e),
    }
}

// ============================================================================
// API: Checks
// ============================================================================

/// Run a check now, outside the schedule.
pub async fn handle_check(State(state): State<AppState>) -> Response {
    match state.monitor.process_check().await {
        Ok(record) => Json(record).into_response(),
        Err(e) => {
            tracing::error!("Manual check failed: {}", e);
            monitor_error(e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChecksQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn handle_get_checks(
    State(state): State<AppState>,
    Query(query): Query<ChecksQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_CHECKS_LIMIT)
        .min(MAX_CHECKS_LIMIT);

    match state.monitor.recent_checks(limit).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => monitor_error(e),
    }
}

// ============================================================================
// API: Status
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub service: String,
    pub target: String,
    pub method: String,
    pub expected_status: String,
    pub interval_secs: u64,
    pub timeout_ms: u64,
    pub grace_period: u32,
    pub latest: Option<ProbeRecord>,
}

pub async fn handle_status(State(state): State<AppState>) -> Response {
    let latest = match state.monitor.recent_checks(1).await {
        Ok(mut records) => records.pop(),
        Err(e) => return monitor_error(e),
    };

    let target = &state.config.target;
    Json(StatusResponse {
        service: state.monitor.service_name().to_string(),
        target: target.url.to_string(),
        method: target.method.to_string(),
        expected_status: target.expected_status.to_string(),
        interval_secs: target.interval.as_secs(),
        timeout_ms: target.timeout.as_millis() as u64,
        grace_period: state.monitor.grace_period(),
        latest,
    })
    .into_response()
}
