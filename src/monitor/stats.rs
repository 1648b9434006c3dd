//! Aggregate statistics and incident segmentation over a window of checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::ProbeRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
}

/// A maximal run of failing checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub start_time: DateTime<Utc>,
    /// First successful check after the run; `None` while still ongoing.
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    /// Error of the first failing check in the run.
    pub error_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_checks: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
    pub uptime_percentage: f64,
    pub average_response_time: u64,
    pub current_status: Status,
    pub last_check_time: Option<DateTime<Utc>>,
    /// Most recent first.
    pub incidents: Vec<Incident>,
}

impl Stats {
    /// No data reads as down.
    pub fn empty() -> Self {
        Self {
            total_checks: 0,
            successful_checks: 0,
            failed_checks: 0,
            uptime_percentage: 0.0,
            average_response_time: 0,
            current_status: Status::Down,
            last_check_time: None,
            incidents: Vec::new(),
        }
    }
}

/// Compute stats for the given records, in any order.
///
/// `now` closes the duration of an incident still open at the end of the window.
pub fn compute(mut records: Vec<ProbeRecord>, now: DateTime<Utc>) -> Stats {
    if records.is_empty() {
        return Stats::empty();
    }

    // Stable: ties keep the store's insertion order.
    records.sort_by_key(|r| r.timestamp);

    let total = records.len() as u64;
    let successful = records.iter().filter(|r| r.up).count() as u64;
    let response_sum: u128 = records.iter().map(|r| r.response_time as u128).sum();

    // Non-empty, checked above.
    let latest = &records[records.len() - 1];

    Stats {
        total_checks: total,
        successful_checks: successful,
        failed_checks: total - successful,
        uptime_percentage: round2(successful as f64 / total as f64 * 100.0),
        average_response_time: (response_sum as f64 / total as f64).round() as u64,
        current_status: if latest.up { Status::Up } else { Status::Down },
        last_check_time: Some(latest.timestamp),
        incidents: segment_incidents(&records, now),
    }
}

/// Split chronologically ordered records into incidents, most recent first.
pub fn segment_incidents(records: &[ProbeRecord], now: DateTime<Utc>) -> Vec<Incident> {
    let mut incidents = Vec::new();
    let mut open: Option<Incident> = None;

    for record in records {
        if !record.up {
            // Later failures in the same run leave the incident untouched.
            if open.is_none() {
                open = Some(Incident {
                    start_time: record.timestamp,
                    end_time: None,
                    duration_minutes: 0,
                    error_message: record
                        .err
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string()),
                });
            }
        } else if let Some(mut incident) = open.take() {
            incident.end_time = Some(record.timestamp);
            incident.duration_minutes = minutes_between(incident.start_time, record.timestamp);
            incidents.push(incident);
        }
    }

    if let Some(mut incident) = open {
        incident.duration_minutes = minutes_between(incident.start_time, now);
        incidents.push(incident);
    }

    incidents.reverse();
    incidents
}

fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let ms = (end - start).num_milliseconds();
    (ms as f64 / 60_000.0).round() as i64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    /// Build one record per minute from a compact pattern.
    fn series(pattern: &[(bool, Option<&str>)]) -> Vec<ProbeRecord> {
        let mut failures = 0;
        pattern
            .iter()
            .enumerate()
            .map(|(i, (up, err))| {
                failures = if *up { 0 } else { failures + 1 };
                ProbeRecord {
                    timestamp: t0() + Duration::minutes(i as i64),
                    up: *up,
                    response_time: 100,
                    err: err.map(str::to_string),
                    status_code: if *up { Some(200) } else { None },
                    consecutive_failures: failures,
                }
            })
            .collect()
    }

    const UP: (bool, Option<&str>) = (true, None);

    fn down(err: &str) -> (bool, Option<&str>) {
        (false, Some(err))
    }

    #[test]
    fn test_empty_window_reads_as_down() {
        let stats = compute(Vec::new(), t0());
        assert_eq!(stats.total_checks, 0);
        assert_eq!(stats.uptime_percentage, 0.0);
        assert_eq!(stats.current_status, Status::Down);
        assert!(stats.last_check_time.is_none());
        assert!(stats.incidents.is_empty());
    }

    #[test]
    fn test_incident_segmentation() {
        let records = series(&[UP, down("errA"), down("errB"), UP, UP, down("errC"), UP]);
        let stats = compute(records, t0() + Duration::hours(1));

        assert_eq!(stats.incidents.len(), 2);

        let newest = &stats.incidents[0];
        assert_eq!(newest.error_message, "errC");
        assert_eq!(newest.start_time, t0() + Duration::minutes(5));
        assert_eq!(newest.end_time, Some(t0() + Duration::minutes(6)));
        assert_eq!(newest.duration_minutes, 1);

        let older = &stats.incidents[1];
        assert_eq!(older.error_message, "errA");
        assert_eq!(older.start_time, t0() + Duration::minutes(1));
        assert_eq!(older.end_time, Some(t0() + Duration::minutes(3)));
        assert_eq!(older.duration_minutes, 2);

        assert_eq!(stats.current_status, Status::Up);
        assert_eq!(stats.last_check_time, Some(t0() + Duration::minutes(6)));
    }

    #[test]
    fn test_ongoing_incident_uses_now() {
        let records = series(&[UP, down("refused"), down("refused")]);
        let now = t0() + Duration::minutes(31);
        let stats = compute(records, now);

        assert_eq!(stats.incidents.len(), 1);
        assert_eq!(stats.incidents[0].end_time, None);
        assert_eq!(stats.incidents[0].duration_minutes, 30);
        assert_eq!(stats.current_status, Status::Down);
    }

    #[test]
    fn test_uptime_arithmetic() {
        let mut pattern = vec![UP; 7];
        pattern.extend([down("x"), down("x"), down("x")]);
        let stats = compute(series(&pattern), t0());

        assert_eq!(stats.total_checks, 10);
        assert_eq!(stats.successful_checks, 7);
        assert_eq!(stats.failed_checks, 3);
        assert_eq!(stats.uptime_percentage, 70.0);
    }

    #[test]
    fn test_uptime_rounds_to_two_decimals() {
        let stats = compute(series(&[UP, UP, down("x")]), t0());
        assert_eq!(stats.uptime_percentage, 66.67);
    }

    #[test]
    fn test_average_response_time_rounds_half_up() {
        let mut records = series(&[UP, UP]);
        records[0].response_time = 100;
        records[1].response_time = 101;
        assert_eq!(compute(records, t0()).average_response_time, 101);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut records = series(&[UP, down("a"), UP, down("b")]);
        records.reverse();
        let stats = compute(records, t0() + Duration::minutes(10));

        assert_eq!(stats.current_status, Status::Down);
        assert_eq!(stats.incidents.len(), 2);
        assert_eq!(stats.incidents[0].error_message, "b");
        assert!(stats.incidents[0].end_time.is_none());
    }

    #[test]
    fn test_duration_rounds_to_nearest_minute() {
        let mut records = series(&[down("x"), UP]);
        records[1].timestamp = records[0].timestamp + Duration::seconds(90);
        let incidents = segment_incidents(&records, t0());
        assert_eq!(incidents[0].duration_minutes, 2);

        records[1].timestamp = records[0].timestamp + Duration::seconds(89);
        let incidents = segment_incidents(&records, t0());
        assert_eq!(incidents[0].duration_minutes, 1);
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let stats = compute(series(&[down("x")]), t0() + Duration::minutes(1));
        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["currentStatus"], "down");
        assert_eq!(json["totalChecks"], 1);
        assert!(json["incidents"][0]["endTime"].is_null());
        assert_eq!(json["incidents"][0]["errorMessage"], "x");
    }
}
