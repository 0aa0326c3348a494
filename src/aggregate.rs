//! Daily aggregation and price/sentiment alignment.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::ingest::PriceBar;
use crate::sentiment::ScoredHeadline;
use crate::store::{DailyRow, Field};

/// Mean score per calendar date. Dates without headlines are absent.
pub fn aggregate_daily(scored: &[ScoredHeadline]) -> BTreeMap<NaiveDate, f64> {
    let mut acc: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for s in scored {
        let e = acc.entry(s.date).or_insert((0.0, 0));
        e.0 += s.score;
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(d, (sum, n))| (d, sum / n as f64))
        .collect()
}

/// Result of joining daily sentiment with price bars.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub rows: Vec<DailyRow>,
    /// Days that had sentiment but no trading price; not persisted.
    pub unmatched_sentiment_days: usize,
    /// Rows that carry both price and sentiment.
    pub matched_days: usize,
}

/// One row per price date; sentiment is set where that date has headlines
/// and left untouched (`Keep`) otherwise.
pub fn align(ticker: &str, daily: &BTreeMap<NaiveDate, f64>, prices: &[PriceBar]) -> Alignment {
    let mut rows = Vec::with_capacity(prices.len());
    let mut matched = 0usize;

    for bar in prices {
        let sentiment = match daily.get(&bar.date) {
            Some(&avg) => {
                matched += 1;
                Field::Set(Some(avg))
            }
            None => Field::Keep,
        };
        rows.push(DailyRow {
            ticker: ticker.to_string(),
            date: bar.date,
            adj_close: Field::Set(bar.adj_close),
            sentiment_score: sentiment,
        });
    }

    let price_dates: BTreeSet<NaiveDate> = prices.iter().map(|b| b.date).collect();
    let unmatched = daily.keys().filter(|d| !price_dates.contains(d)).count();

    Alignment {
        rows,
        unmatched_sentiment_days: unmatched,
        matched_days: matched,
    }
}
