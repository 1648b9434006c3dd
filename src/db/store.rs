//! SQLite database store implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;

/// Fixed-width so that lexical order in SQLite matches chronological order.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Append-only log of checks.
///
/// Implementations must return records in insertion order when timestamps tie.
#[async_trait]
pub trait ProbeStore: Send + Sync {
    /// Append a record.
    async fn save(&self, record: &ProbeRecord) -> Result<(), DbError>;

    /// Up to `n` records, most recent first.
    async fn most_recent(&self, n: usize) -> Result<Vec<ProbeRecord>, DbError>;

    /// Records with `start <= timestamp <= end`, oldest first.
    async fn records_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProbeRecord>, DbError>;
}

/// Thread-safe SQLite store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path. `:memory:` is accepted.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Delete records older than the cutoff. Returns the number removed.
    ///
    /// Only the retention sweeper calls this; the monitoring path never deletes.
    pub fn delete_records_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM checks WHERE time < ?1",
            params![format_db_time(cutoff)],
        )?;
        Ok(removed)
    }
}

#[async_trait]
impl ProbeStore for SqliteStore {
    async fn save(&self, record: &ProbeRecord) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO checks (time, up, response_time, err, status_code, consecutive_failures)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                format_db_time(record.timestamp),
                record.up,
                i64::try_from(record.response_time).unwrap_or(i64::MAX),
                record.err,
                record.status_code,
                record.consecutive_failures,
            ],
        )?;
        Ok(())
    }

    async fn most_recent(&self, n: usize) -> Result<Vec<ProbeRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT time, up, response_time, err, status_code, consecutive_failures
             FROM checks ORDER BY time DESC, id DESC LIMIT ?1",
        )?;

        let records = stmt
            .query_map(params![i64::try_from(n).unwrap_or(i64::MAX)], map_record)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(records)
    }

    async fn records_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProbeRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT time, up, response_time, err, status_code, consecutive_failures
             FROM checks WHERE time >= ?1 AND time <= ?2 ORDER BY time ASC, id ASC",
        )?;

        let records = stmt
            .query_map(
                params![format_db_time(start), format_db_time(end)],
                map_record,
            )?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(records)
    }
}

fn map_record(row: &Row<'_>) -> SqlResult<ProbeRecord> {
    let time_str: String = row.get(0)?;
    let timestamp = parse_db_time(&time_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("invalid timestamp: {}", time_str).into(),
        )
    })?;
    let response_time: i64 = row.get(2)?;

    Ok(ProbeRecord {
        timestamp,
        up: row.get(1)?,
        response_time: u64::try_from(response_time).unwrap_or(0),
        err: row.get(3)?,
        status_code: row.get(4)?,
        consecutive_failures: row.get(5)?,
    })
}

fn format_db_time(dt: DateTime<Utc>) -> String {
    dt.format(TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::NamedTempFile;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn record(ts: DateTime<Utc>, up: bool, failures: u32) -> ProbeRecord {
        ProbeRecord {
            timestamp: ts,
            up,
            response_time: 120,
            err: if up { None } else { Some("connection refused".to_string()) },
            status_code: if up { Some(200) } else { None },
            consecutive_failures: failures,
        }
    }

    #[tokio::test]
    async fn test_save_and_read_back_every_field() {
        let store = SqliteStore::new(":memory:").unwrap();
        let rec = ProbeRecord {
            timestamp: Utc::now(),
            up: false,
            response_time: 5000,
            err: Some("Timeout after 5000ms".to_string()),
            status_code: Some(503),
            consecutive_failures: 4,
        };
        store.save(&rec).await.unwrap();

        let fetched = store.most_recent(1).await.unwrap();
        assert_eq!(fetched, vec![rec]);
    }

    #[tokio::test]
    async fn test_most_recent_orders_newest_first() {
        let store = SqliteStore::new(":memory:").unwrap();
        for (i, up) in [true, false, true].into_iter().enumerate() {
            store.save(&record(at(i as i64), up, 0)).await.unwrap();
        }

        let fetched = store.most_recent(2).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].timestamp, at(2));
        assert_eq!(fetched[1].timestamp, at(1));

        assert!(store.most_recent(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tied_timestamps_keep_insertion_order() {
        let store = SqliteStore::new(":memory:").unwrap();
        store.save(&record(at(5), false, 1)).await.unwrap();
        store.save(&record(at(5), false, 2)).await.unwrap();

        let newest = store.most_recent(1).await.unwrap();
        assert_eq!(newest[0].consecutive_failures, 2);

        let ranged = store.records_in_range(at(5), at(5)).await.unwrap();
        let counts: Vec<u32> = ranged.iter().map(|r| r.consecutive_failures).collect();
        assert_eq!(counts, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_range_is_inclusive() {
        let store = SqliteStore::new(":memory:").unwrap();
        for i in 0..5 {
            store.save(&record(at(i * 60), true, 0)).await.unwrap();
        }

        let ranged = store.records_in_range(at(60), at(180)).await.unwrap();
        let times: Vec<_> = ranged.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![at(60), at(120), at(180)]);
    }

    #[tokio::test]
    async fn test_delete_records_before() {
        let store = SqliteStore::new(":memory:").unwrap();
        for i in 0..4 {
            store.save(&record(at(i), true, 0)).await.unwrap();
        }

        let removed = store.delete_records_before(at(2)).unwrap();
        assert_eq!(removed, 2);

        let left = store.records_in_range(at(0), at(10)).await.unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left[0].timestamp, at(2));
    }

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let store = SqliteStore::new(tmp.path()).unwrap();
            store.save(&record(at(0), false, 1)).await.unwrap();
        }

        let reopened = SqliteStore::new(tmp.path()).unwrap();
        let fetched = reopened.most_recent(10).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].consecutive_failures, 1);
    }

    #[test]
    fn test_parse_db_time_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 56).unwrap();
        assert_eq!(parse_db_time("2024-01-01 12:34:56.000000000"), Some(expected));
        assert_eq!(parse_db_time("2024-01-01 12:34:56"), Some(expected));
        assert_eq!(parse_db_time("2024-01-01T12:34:56Z"), Some(expected));
        assert_eq!(parse_db_time("not a time"), None);
    }
}
