//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeOutcome;

/// A single executed check, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRecord {
    pub timestamp: DateTime<Utc>,
    pub up: bool,
    /// Duration of the probe attempt in milliseconds, timeouts included.
    pub response_time: u64,
    pub err: Option<String>,
    pub status_code: Option<u16>,
    /// Failing checks in a row, ending at and including this one.
    pub consecutive_failures: u32,
}

impl ProbeRecord {
    /// Build the record for a fresh outcome.
    pub fn from_outcome(
        timestamp: DateTime<Utc>,
        outcome: ProbeOutcome,
        consecutive_failures: u32,
    ) -> Self {
        Self {
            timestamp,
            up: outcome.up,
            response_time: outcome.response_time,
            err: outcome.err,
            status_code: outcome.status_code,
            consecutive_failures,
        }
    }
}
