// src/store.rs
//! Persistence of daily (ticker, date) rows in SQLite.
//!
//! Writes are partial-merge upserts: a column is overwritten only when the
//! incoming row marks it `Field::Set`, so a price-only pass and a sentiment
//! pass over the same day can land in either order without clobbering each
//! other. Each `upsert` call is one transaction.

use chrono::NaiveDate;
use rusqlite::{ffi, params, Connection, ErrorCode};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const TABLE: &str = "financial_sentiment";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS financial_sentiment (
    ticker          TEXT NOT NULL CHECK (length(ticker) BETWEEN 1 AND 10),
    date            TEXT NOT NULL,
    adj_close       NUMERIC(12, 4),
    sentiment_score NUMERIC(7, 6)
        CHECK (sentiment_score IS NULL OR sentiment_score BETWEEN -1 AND 1),
    PRIMARY KEY (ticker, date)
);
CREATE INDEX IF NOT EXISTS idx_financial_sentiment_ticker ON financial_sentiment (ticker);
CREATE INDEX IF NOT EXISTS idx_financial_sentiment_date ON financial_sentiment (date);
"#;

const UPSERT_SQL: &str = r#"
INSERT INTO financial_sentiment (ticker, date, adj_close, sentiment_score)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (ticker, date) DO UPDATE SET
    adj_close = CASE WHEN ?5 THEN excluded.adj_close ELSE financial_sentiment.adj_close END,
    sentiment_score = CASE WHEN ?6 THEN excluded.sentiment_score ELSE financial_sentiment.sentiment_score END
"#;

const QUERY_SQL: &str = r#"
SELECT ticker, date, adj_close, sentiment_score
FROM financial_sentiment
WHERE ticker = ?1
  AND (?2 IS NULL OR date >= ?2)
  AND (?3 IS NULL OR date <= ?3)
ORDER BY date
"#;

/// NUMERIC(12,4) upper bound.
const MAX_ADJ_CLOSE: f64 = 99_999_999.9999;

/// Present/absent marker for one updatable column.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Field<T> {
    /// Not supplied in this batch; an existing value is left as is.
    #[default]
    Keep,
    Set(T),
}

impl<T> Field<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Field::Set(_))
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Field::Set(v) => Some(v),
            Field::Keep => None,
        }
    }
}

/// Write-side unit, keyed by `(ticker, date)`.
///
/// `sentiment_score` is `Field<Option<f64>>`: `Set(None)` writes NULL,
/// `Keep` leaves whatever is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRow {
    pub ticker: String,
    pub date: NaiveDate,
    pub adj_close: Field<f64>,
    pub sentiment_score: Field<Option<f64>>,
}

impl DailyRow {
    pub fn price(ticker: &str, date: NaiveDate, adj_close: f64) -> Self {
        Self {
            ticker: ticker.to_string(),
            date,
            adj_close: Field::Set(adj_close),
            sentiment_score: Field::Keep,
        }
    }

    pub fn sentiment(ticker: &str, date: NaiveDate, score: Option<f64>) -> Self {
        Self {
            ticker: ticker.to_string(),
            date,
            adj_close: Field::Keep,
            sentiment_score: Field::Set(score),
        }
    }
}

/// Read-side view of a persisted row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRow {
    pub ticker: String,
    pub date: NaiveDate,
    pub adj_close: Option<f64>,
    pub sentiment_score: Option<f64>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database path: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid row {ticker}@{date}: {reason}")]
    InvalidRow {
        ticker: String,
        date: NaiveDate,
        reason: String,
    },
}

impl StoreError {
    /// True when the database itself is unusable, not just this batch.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::NotADatabase
            ),
            StoreError::Io(_) => true,
            _ => false,
        }
    }
}

/// Storage seam used by the orchestrator and the analyzer.
pub trait DailyStore {
    /// Upsert a batch atomically; returns rows written.
    fn upsert(&mut self, rows: &[DailyRow]) -> Result<usize, StoreError>;

    /// Rows for `ticker` ordered by date; bounds are inclusive and optional.
    fn query(
        &self,
        ticker: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<StoredRow>, StoreError>;

    /// Cheap liveness probe.
    fn ping(&self) -> bool;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        tracing::info!(target: "store", path = %path.as_ref().display(), "database opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Create table and indexes if absent. Safe to call repeatedly.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        tracing::debug!(target: "store", table = TABLE, "schema ensured");
        Ok(())
    }
}

impl DailyStore for SqliteStore {
    fn upsert(&mut self, rows: &[DailyRow]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
            for row in rows {
                validate(row)?;
                let adj_close = row.adj_close.as_set().map(|p| round_to(*p, 4));
                let sentiment = row
                    .sentiment_score
                    .as_set()
                    .copied()
                    .flatten()
                    .map(|s| round_to(s, 6));
                written += stmt.execute(params![
                    row.ticker,
                    row.date,
                    adj_close,
                    sentiment,
                    row.adj_close.is_set(),
                    row.sentiment_score.is_set(),
                ])?;
            }
        }
        // Dropping `tx` without commit rolls the whole batch back.
        tx.commit()?;
        tracing::debug!(target: "store", rows = written, "batch upserted");
        Ok(written)
    }

    fn query(
        &self,
        ticker: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<StoredRow>, StoreError> {
        let mut stmt = self.conn.prepare_cached(QUERY_SQL)?;
        let rows = stmt
            .query_map(params![ticker, start, end], |r| {
                Ok(StoredRow {
                    ticker: r.get(0)?,
                    date: r.get(1)?,
                    adj_close: r.get(2)?,
                    sentiment_score: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn ping(&self) -> bool {
        self.conn
            .query_row("SELECT 1", [], |r| r.get::<_, i64>(0))
            .is_ok()
    }
}

fn validate(row: &DailyRow) -> Result<(), StoreError> {
    let invalid = |reason: String| StoreError::InvalidRow {
        ticker: row.ticker.clone(),
        date: row.date,
        reason,
    };
    if let Field::Set(p) = row.adj_close {
        if !p.is_finite() || p.abs() > MAX_ADJ_CLOSE {
            return Err(invalid(format!("adj_close {p} out of range")));
        }
    }
    if let Field::Set(Some(s)) = row.sentiment_score {
        if !s.is_finite() || !(-1.0..=1.0).contains(&s) {
            return Err(invalid(format!("sentiment_score {s} outside [-1, 1]")));
        }
    }
    Ok(())
}

fn round_to(v: f64, places: i32) -> f64 {
    let m = 10f64.powi(places);
    (v * m).round() / m
}

/// Build an SQLite failure with the given primary result code.
pub fn sqlite_failure(code: i32, msg: &str) -> StoreError {
    StoreError::Sqlite(rusqlite::Error::SqliteFailure(
        ffi::Error::new(code),
        Some(msg.to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn store() -> SqliteStore {
        let s = SqliteStore::open_in_memory().unwrap();
        s.ensure_schema().unwrap();
        s
    }

    #[test]
    fn schema_is_idempotent() {
        let s = store();
        s.ensure_schema().unwrap();
        s.ensure_schema().unwrap();
        assert!(s.ping());
    }

    #[test]
    fn insert_then_query_ordered() {
        let mut s = store();
        s.upsert(&[
            DailyRow::price("ABC", d(3), 51.0),
            DailyRow::price("ABC", d(2), 50.0),
            DailyRow::price("XYZ", d(2), 9.0),
        ])
        .unwrap();
        let rows = s.query("ABC", None, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, d(2));
        assert_eq!(rows[1].date, d(3));
        assert_eq!(rows[0].sentiment_score, None);
    }

    #[test]
    fn keep_leaves_existing_value_set_none_clears_it() {
        let mut s = store();
        s.upsert(&[DailyRow::sentiment("ABC", d(2), Some(0.5))]).unwrap();
        s.upsert(&[DailyRow::price("ABC", d(2), 50.0)]).unwrap();
        let r = &s.query("ABC", None, None).unwrap()[0];
        assert_eq!(r.sentiment_score, Some(0.5));

        s.upsert(&[DailyRow::sentiment("ABC", d(2), None)]).unwrap();
        let r = &s.query("ABC", None, None).unwrap()[0];
        assert_eq!(r.sentiment_score, None);
        assert_eq!(r.adj_close, Some(50.0));
    }

    #[test]
    fn values_are_rounded_to_column_scale() {
        let mut s = store();
        s.upsert(&[DailyRow {
            ticker: "ABC".into(),
            date: d(2),
            adj_close: Field::Set(123.456789),
            sentiment_score: Field::Set(Some(0.123456789)),
        }])
        .unwrap();
        let r = &s.query("ABC", None, None).unwrap()[0];
        assert_eq!(r.adj_close, Some(123.4568));
        assert_eq!(r.sentiment_score, Some(0.123457));
    }

    #[test]
    fn invalid_row_rolls_back_whole_batch() {
        let mut s = store();
        let err = s
            .upsert(&[
                DailyRow::price("ABC", d(2), 50.0),
                DailyRow::sentiment("ABC", d(3), Some(1.5)),
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow { .. }));
        assert!(!err.is_connection_fatal());
        assert!(s.query("ABC", None, None).unwrap().is_empty());
    }

    #[test]
    fn query_bounds_are_inclusive() {
        let mut s = store();
        let rows: Vec<_> = (2..=6).map(|day| DailyRow::price("ABC", d(day), day as f64)).collect();
        s.upsert(&rows).unwrap();
        let got = s.query("ABC", Some(d(3)), Some(d(5))).unwrap();
        assert_eq!(got.iter().map(|r| r.date).collect::<Vec<_>>(), vec![d(3), d(4), d(5)]);
        assert_eq!(s.query("ABC", Some(d(6)), None).unwrap().len(), 1);
    }

    #[test]
    fn fatal_classification() {
        assert!(sqlite_failure(ffi::SQLITE_CORRUPT, "corrupt").is_connection_fatal());
        assert!(sqlite_failure(ffi::SQLITE_IOERR, "io").is_connection_fatal());
        assert!(!sqlite_failure(ffi::SQLITE_CONSTRAINT, "constraint").is_connection_fatal());
    }

    #[test]
    fn open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/sentiment.db");
        let s = SqliteStore::open(&path).unwrap();
        s.ensure_schema().unwrap();
        assert!(path.exists());
    }
}
