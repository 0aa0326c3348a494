// tests/common/mod.rs
// Deterministic stand-ins for the network sources and the scorer.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use ticker_sentiment_pipeline::ingest::{HeadlineRecord, HeadlineSource, PriceBar, PriceSource};
use ticker_sentiment_pipeline::store::{sqlite_failure, DailyRow, DailyStore, StoreError, StoredRow};
use ticker_sentiment_pipeline::{HeadlineScorer, SourceError};

pub fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, day).unwrap()
}

pub fn at(date: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
    date.and_hms_opt(h, min, 0).unwrap()
}

/// Headlines per ticker; tickers not in the map answer HTTP 404.
#[derive(Default)]
pub struct StubHeadlines {
    pub by_ticker: HashMap<String, Vec<(NaiveDateTime, String)>>,
}

impl StubHeadlines {
    pub fn with(mut self, ticker: &str, items: &[(NaiveDateTime, &str)]) -> Self {
        self.by_ticker.insert(
            ticker.to_string(),
            items.iter().map(|(t, s)| (*t, s.to_string())).collect(),
        );
        self
    }
}

#[async_trait]
impl HeadlineSource for StubHeadlines {
    async fn fetch(&self, ticker: &str) -> Result<Vec<HeadlineRecord>, SourceError> {
        let items = self.by_ticker.get(ticker).ok_or(SourceError::Status(404))?;
        Ok(items
            .iter()
            .map(|(ts, text)| HeadlineRecord {
                ticker: ticker.to_string(),
                raw_timestamp: ts.format("%b-%d-%y %I:%M%p").to_string(),
                published_at: *ts,
                headline: text.clone(),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Price bars per ticker, filtered to the requested range; unknown tickers are empty.
#[derive(Default)]
pub struct StubPrices {
    pub by_ticker: HashMap<String, Vec<PriceBar>>,
}

impl StubPrices {
    pub fn with(mut self, ticker: &str, bars: &[(NaiveDate, f64)]) -> Self {
        self.by_ticker.insert(
            ticker.to_string(),
            bars.iter()
                .map(|(date, adj_close)| PriceBar {
                    date: *date,
                    adj_close: *adj_close,
                })
                .collect(),
        );
        self
    }
}

#[async_trait]
impl PriceSource for StubPrices {
    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, SourceError> {
        let bars = self.by_ticker.get(ticker).ok_or(SourceError::Empty)?;
        Ok(bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .copied()
            .collect())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Scores by exact headline text; anything else is neutral.
#[derive(Default)]
pub struct TableScorer(pub HashMap<String, f64>);

impl TableScorer {
    pub fn with(mut self, text: &str, score: f64) -> Self {
        self.0.insert(text.to_string(), score);
        self
    }
}

impl HeadlineScorer for TableScorer {
    fn score(&self, text: &str) -> f64 {
        self.0.get(text).copied().unwrap_or(0.0)
    }
}

/// A store whose disk has gone away.
pub struct DeadStore;

impl DailyStore for DeadStore {
    fn upsert(&mut self, _rows: &[DailyRow]) -> Result<usize, StoreError> {
        Err(sqlite_failure(rusqlite::ffi::SQLITE_IOERR, "disk I/O error"))
    }

    fn query(
        &self,
        _ticker: &str,
        _start: Option<NaiveDate>,
        _end: Option<NaiveDate>,
    ) -> Result<Vec<StoredRow>, StoreError> {
        Err(sqlite_failure(rusqlite::ffi::SQLITE_IOERR, "disk I/O error"))
    }

    fn ping(&self) -> bool {
        false
    }
}
