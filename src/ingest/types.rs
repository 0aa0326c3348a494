// src/ingest/types.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// One scraped headline, timestamp already normalized to source-local time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeadlineRecord {
    pub ticker: String,
    pub raw_timestamp: String,       // cell text as scraped, e.g. "Jan-02-24 09:30AM"
    pub published_at: NaiveDateTime, // source timezone
    pub headline: String,            // normalized text
}

impl HeadlineRecord {
    pub fn date(&self) -> NaiveDate {
        self.published_at.date()
    }
}

/// One daily adjusted close.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub adj_close: f64,
}

#[async_trait::async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn fetch(&self, ticker: &str) -> Result<Vec<HeadlineRecord>, SourceError>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    /// Bars for `[start, end]`, ascending, one per date.
    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, SourceError>;
    fn name(&self) -> &'static str;
}
