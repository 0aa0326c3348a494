// src/ingest/finviz.rs
//! Finviz quote-page headline source.
//!
//! The page carries a `#news-table` whose rows are `<td>timestamp</td><td><a>headline</a></td>`.
//! Only the first row of each day shows the date; following rows show the time alone.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::error::SourceError;
use crate::ingest::normalize_text;
use crate::ingest::rate_limit::RequestGate;
use crate::ingest::types::{HeadlineRecord, HeadlineSource};
use crate::metrics::{HEADLINES_SCRAPED, PARSE_MS, SOURCE_ERRORS};

pub const DEFAULT_URL_TEMPLATE: &str = "https://finviz.com/quote.ashx?t={ticker}";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const DATE_TIME_FMT: &str = "%b-%d-%y %I:%M%p";
const TIME_FMT: &str = "%I:%M%p";

static TABLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("#news-table").unwrap());
static ROW_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static LINK_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

pub struct FinvizHeadlineSource {
    mode: Mode,
    utc_offset: FixedOffset,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        url_template: String,
        gate: RequestGate,
    },
}

impl FinvizHeadlineSource {
    pub fn from_url_template(
        url_template: impl Into<String>,
        user_agent: &str,
        gate: RequestGate,
        utc_offset: FixedOffset,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("building finviz http client")?;
        Ok(Self {
            mode: Mode::Http {
                client,
                url_template: url_template.into(),
                gate,
            },
            utc_offset,
        })
    }

    /// Parse a fixed HTML document for every ticker (tests, offline runs).
    pub fn from_fixture(html: &str, utc_offset: FixedOffset) -> Self {
        Self {
            mode: Mode::Fixture(html.to_string()),
            utc_offset,
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.utc_offset).date_naive()
    }
}

#[async_trait]
impl HeadlineSource for FinvizHeadlineSource {
    async fn fetch(&self, ticker: &str) -> Result<Vec<HeadlineRecord>, SourceError> {
        let today = self.today();
        let result = match &self.mode {
            Mode::Fixture(html) => parse_news_table(ticker, html, today),
            Mode::Http {
                client,
                url_template,
                gate,
            } => match fetch_page(client, url_template, gate, ticker).await {
                Ok(body) => parse_news_table(ticker, &body, today),
                Err(e) => Err(e),
            },
        };
        result.inspect_err(|e| {
            counter!(SOURCE_ERRORS, "source" => self.name()).increment(1);
            tracing::debug!(target: "ingest", ticker, error = %e, "headline fetch failed");
        })
    }

    fn name(&self) -> &'static str {
        "finviz"
    }
}

async fn fetch_page(
    client: &reqwest::Client,
    url_template: &str,
    gate: &RequestGate,
    ticker: &str,
) -> Result<String, SourceError> {
    gate.wait().await;
    let url = url_template.replace("{ticker}", ticker);
    tracing::debug!(target: "ingest", %url, "fetching headlines");
    let resp = client.get(&url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }
    Ok(resp.text().await?)
}

/// Extract headline rows from a quote page.
///
/// `today` resolves rows stamped "Today HH:MMAM". Rows with an unparsable
/// stamp, or a bare time before any date was seen, are skipped.
pub fn parse_news_table(
    ticker: &str,
    html: &str,
    today: NaiveDate,
) -> Result<Vec<HeadlineRecord>, SourceError> {
    let t0 = std::time::Instant::now();
    let doc = Html::parse_document(html);

    let table = doc
        .select(&TABLE_SEL)
        .next()
        .ok_or_else(|| SourceError::Layout("news-table not found".into()))?;

    let mut out = Vec::new();
    let mut current_date: Option<NaiveDate> = None;

    for row in table.select(&ROW_SEL) {
        let cells: Vec<_> = row.select(&CELL_SEL).collect();
        if cells.len() != 2 {
            continue;
        }
        let raw_ts = collapse_ws(&cells[0].text().collect::<String>());
        let headline_raw = match cells[1].select(&LINK_SEL).next() {
            Some(a) => a.text().collect::<String>(),
            None => cells[1].text().collect::<String>(),
        };
        let headline = normalize_text(&headline_raw);
        if headline.is_empty() {
            continue;
        }

        let Some(published_at) = parse_timestamp(&raw_ts, &mut current_date, today) else {
            tracing::trace!(target: "ingest", ticker, raw = %raw_ts, "skipping row with unparsable timestamp");
            continue;
        };

        out.push(HeadlineRecord {
            ticker: ticker.to_string(),
            raw_timestamp: raw_ts,
            published_at,
            headline,
        });
    }

    histogram!(PARSE_MS).record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!(HEADLINES_SCRAPED).increment(out.len() as u64);

    if out.is_empty() {
        return Err(SourceError::Empty);
    }
    Ok(out)
}

/// Interpret one timestamp cell, updating the running date context.
pub fn parse_timestamp(
    raw: &str,
    current_date: &mut Option<NaiveDate>,
    today: NaiveDate,
) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Some((day, time)) = raw.split_once(' ') {
        let time = NaiveTime::parse_from_str(time.trim(), TIME_FMT).ok()?;
        let date = match day.to_ascii_lowercase().as_str() {
            "today" => today,
            "yesterday" => today - Duration::days(1),
            _ => NaiveDateTime::parse_from_str(raw, DATE_TIME_FMT).ok()?.date(),
        };
        *current_date = Some(date);
        return Some(date.and_time(time));
    }
    let time = NaiveTime::parse_from_str(raw, TIME_FMT).ok()?;
    current_date.map(|d| d.and_time(time))
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
