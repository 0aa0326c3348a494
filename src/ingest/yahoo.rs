// src/ingest/yahoo.rs
//! Daily adjusted closes from the Yahoo Finance chart API.

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use metrics::counter;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

use crate::error::SourceError;
use crate::ingest::rate_limit::RequestGate;
use crate::ingest::types::{PriceBar, PriceSource};
use crate::metrics::SOURCE_ERRORS;

pub struct YahooPriceSource {
    gate: RequestGate,
    utc_offset: FixedOffset,
}

impl YahooPriceSource {
    pub fn new(gate: RequestGate, utc_offset: FixedOffset) -> Self {
        Self { gate, utc_offset }
    }
}

#[async_trait]
impl PriceSource for YahooPriceSource {
    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, SourceError> {
        self.gate.wait().await;

        let provider = yahoo::YahooConnector::new().map_err(remote_err)?;

        // Range end is exclusive on the remote side.
        let start_odt = midnight_utc(start)?;
        let end_odt = midnight_utc(end + Duration::days(1))?;

        tracing::debug!(target: "ingest", ticker, %start, %end, "fetching price history");
        let response = provider
            .get_quote_history(ticker, start_odt, end_odt)
            .await
            .map_err(remote_err)?;
        let quotes = response.quotes().map_err(remote_err)?;

        let raw = quotes
            .iter()
            .filter_map(|q| {
                let ts = DateTime::from_timestamp(q.timestamp as i64, 0)?;
                Some(PriceBar {
                    date: ts.with_timezone(&self.utc_offset).date_naive(),
                    adj_close: q.adjclose,
                })
            })
            .collect();

        let bars = normalize_bars(raw, start, end);
        if bars.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(bars)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

/// Sort ascending, keep the last bar per date, drop non-finite prices and
/// anything outside `[start, end]`.
pub fn normalize_bars(raw: Vec<PriceBar>, start: NaiveDate, end: NaiveDate) -> Vec<PriceBar> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for bar in raw {
        if !bar.adj_close.is_finite() || bar.date < start || bar.date > end {
            continue;
        }
        by_date.insert(bar.date, bar.adj_close);
    }
    by_date
        .into_iter()
        .map(|(date, adj_close)| PriceBar { date, adj_close })
        .collect()
}

fn midnight_utc(d: NaiveDate) -> Result<OffsetDateTime, SourceError> {
    let secs = d
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| SourceError::Remote(format!("invalid date {d}")))?;
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| SourceError::Remote(format!("invalid timestamp: {e}")))
}

fn remote_err(e: yahoo::YahooError) -> SourceError {
    counter!(SOURCE_ERRORS, "source" => "yahoo").increment(1);
    SourceError::Remote(e.to_string())
}
