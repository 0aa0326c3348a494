// src/pipeline.rs
//! Per-ticker orchestration.
//!
//! Each ticker moves through
//! `Pending → Scraping → Scoring → Aggregating → Pricing → Persisting → Analyzing → Done`
//! and ends either `Done` or `Failed { stage, kind, reason }`. A failure ends
//! that ticker only, except when the store connection itself is gone: then the
//! remaining tickers are marked `Aborted` and the run stops.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use crate::aggregate::{aggregate_daily, align};
use crate::analysis::{analyze, CorrelationParams, CorrelationResult};
use crate::error::{ErrorKind, PipelineError, SourceError, SourceKind};
use crate::ingest::{HeadlineSource, PriceSource};
use crate::metrics as m;
use crate::report;
use crate::sentiment::{score_headlines, HeadlineScorer};
use crate::store::DailyStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Scraping,
    Scoring,
    Aggregating,
    Pricing,
    Persisting,
    Analyzing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Pending => "pending",
            Stage::Scraping => "scraping",
            Stage::Scoring => "scoring",
            Stage::Aggregating => "aggregating",
            Stage::Pricing => "pricing",
            Stage::Persisting => "persisting",
            Stage::Analyzing => "analyzing",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TickerStatus {
    Done,
    Failed(Failure),
}

/// Terminal state and counters of one ticker pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerOutcome {
    pub ticker: String,
    pub status: TickerStatus,
    pub headlines_scraped: usize,
    pub headlines_scored: usize,
    pub sentiment_days: usize,
    pub unmatched_sentiment_days: usize,
    pub rows_upserted: usize,
    pub correlation: Option<CorrelationResult>,
    pub chart: Option<PathBuf>,
    pub duration_ms: u64,
}

impl TickerOutcome {
    fn pending(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            status: TickerStatus::Failed(Failure {
                stage: Stage::Pending,
                kind: ErrorKind::Aborted,
                reason: String::new(),
            }),
            headlines_scraped: 0,
            headlines_scored: 0,
            sentiment_days: 0,
            unmatched_sentiment_days: 0,
            rows_upserted: 0,
            correlation: None,
            chart: None,
            duration_ms: 0,
        }
    }

    fn aborted(ticker: &str, reason: &str) -> Self {
        let mut o = Self::pending(ticker);
        o.status = TickerStatus::Failed(Failure {
            stage: Stage::Pending,
            kind: ErrorKind::Aborted,
            reason: format!("run aborted: {reason}"),
        });
        o
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, TickerStatus::Done)
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.status {
            TickerStatus::Failed(f) => Some(f),
            TickerStatus::Done => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub params: CorrelationParams,
    pub tickers: Vec<TickerOutcome>,
    /// Set when a dead store stopped the run early.
    pub aborted: Option<String>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.tickers.iter().filter(|t| t.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.tickers.len() - self.succeeded()
    }

    pub fn headlines_scored(&self) -> usize {
        self.tickers.iter().map(|t| t.headlines_scored).sum()
    }

    pub fn rows_upserted(&self) -> usize {
        self.tickers.iter().map(|t| t.rows_upserted).sum()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn outcome(&self, ticker: &str) -> Option<&TickerOutcome> {
        self.tickers.iter().find(|t| t.ticker == ticker)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<8} {:<7} {:>9} {:>5}  detail", "ticker", "state", "headlines", "rows")?;
        for t in &self.tickers {
            let (state, detail) = match (&t.status, &t.correlation) {
                (TickerStatus::Done, Some(c)) => ("done", c.to_string()),
                (TickerStatus::Done, None) => ("done", String::new()),
                (TickerStatus::Failed(fl), _) => ("failed", format!("[{}] {}", fl.stage, fl.reason)),
            };
            writeln!(
                f,
                "{:<8} {:<7} {:>9} {:>5}  {}",
                t.ticker, state, t.headlines_scored, t.rows_upserted, detail
            )?;
        }
        write!(
            f,
            "succeeded={} failed={} headlines_scored={} rows_upserted={}",
            self.succeeded(),
            self.failed(),
            self.headlines_scored(),
            self.rows_upserted()
        )?;
        if let Some(reason) = &self.aborted {
            write!(f, "\nrun aborted: {reason}")?;
        }
        Ok(())
    }
}

struct StageError {
    stage: Stage,
    error: PipelineError,
}

fn at(stage: Stage) -> impl FnOnce(PipelineError) -> StageError {
    move |error| StageError { stage, error }
}

pub struct Pipeline {
    headlines: Box<dyn HeadlineSource>,
    prices: Box<dyn PriceSource>,
    scorer: Box<dyn HeadlineScorer>,
    store: Box<dyn DailyStore>,
    params: CorrelationParams,
    results_dir: Option<PathBuf>,
    today: Option<NaiveDate>,
}

impl Pipeline {
    pub fn new(
        headlines: Box<dyn HeadlineSource>,
        prices: Box<dyn PriceSource>,
        scorer: Box<dyn HeadlineScorer>,
        store: Box<dyn DailyStore>,
        params: CorrelationParams,
    ) -> Self {
        Self {
            headlines,
            prices,
            scorer,
            store,
            params,
            results_dir: None,
            today: None,
        }
    }

    /// Write per-ticker chart series under `dir`.
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = Some(dir.into());
        self
    }

    /// Pin "today" for the price range (tests, backfills).
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn store(&self) -> &dyn DailyStore {
        self.store.as_ref()
    }

    /// Process tickers sequentially and collect every terminal state.
    pub async fn run(&mut self, tickers: &[String]) -> RunSummary {
        m::ensure_described();
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(tickers.len());
        let mut aborted: Option<String> = None;

        for ticker in tickers {
            if let Some(reason) = &aborted {
                counter!(m::TICKERS, "status" => "aborted").increment(1);
                outcomes.push(TickerOutcome::aborted(ticker, reason));
                continue;
            }

            let t0 = Instant::now();
            let mut outcome = TickerOutcome::pending(ticker);
            match self.run_ticker(ticker, &mut outcome).await {
                Ok(()) => {
                    outcome.status = TickerStatus::Done;
                    counter!(m::TICKERS, "status" => "done").increment(1);
                    tracing::info!(
                        target: "pipeline",
                        ticker = %ticker,
                        headlines = outcome.headlines_scored,
                        rows = outcome.rows_upserted,
                        correlation = %outcome
                            .correlation
                            .as_ref()
                            .map(|c| c.to_string())
                            .unwrap_or_default(),
                        "ticker done"
                    );
                }
                Err(StageError { stage, error }) => {
                    if let PipelineError::Persistence(store_err) = &error {
                        if store_err.is_connection_fatal() || !self.store.ping() {
                            aborted = Some(error.to_string());
                        }
                    }
                    tracing::warn!(
                        target: "pipeline",
                        ticker = %ticker,
                        stage = %stage,
                        error = %error,
                        "ticker failed"
                    );
                    counter!(m::TICKERS, "status" => "failed").increment(1);
                    outcome.status = TickerStatus::Failed(Failure {
                        stage,
                        kind: error.kind(),
                        reason: error.to_string(),
                    });
                }
            }
            outcome.duration_ms = t0.elapsed().as_millis() as u64;
            histogram!(m::TICKER_DURATION_MS).record(outcome.duration_ms as f64);
            outcomes.push(outcome);
        }

        if let Some(reason) = &aborted {
            tracing::error!(target: "pipeline", %reason, "run aborted, store unavailable");
        }

        RunSummary {
            started_at,
            finished_at: Utc::now(),
            params: self.params,
            tickers: outcomes,
            aborted,
        }
    }

    async fn run_ticker(&mut self, ticker: &str, out: &mut TickerOutcome) -> Result<(), StageError> {
        enter(ticker, Stage::Scraping);
        let headlines = self
            .headlines
            .fetch(ticker)
            .await
            .and_then(|h| if h.is_empty() { Err(SourceError::Empty) } else { Ok(h) })
            .map_err(|e| PipelineError::source_unavailable(SourceKind::Headlines, ticker, &e))
            .map_err(at(Stage::Scraping))?;
        out.headlines_scraped = headlines.len();

        enter(ticker, Stage::Scoring);
        let scored = score_headlines(self.scorer.as_ref(), &headlines);
        out.headlines_scored = scored.len();
        counter!(m::HEADLINES_SCORED).increment(scored.len() as u64);

        enter(ticker, Stage::Aggregating);
        let daily = aggregate_daily(&scored);
        out.sentiment_days = daily.len();

        enter(ticker, Stage::Pricing);
        let (start, end) = self.price_range(&daily);
        let bars = self
            .prices
            .fetch(ticker, start, end)
            .await
            .and_then(|b| if b.is_empty() { Err(SourceError::Empty) } else { Ok(b) })
            .map_err(|e| PipelineError::source_unavailable(SourceKind::Prices, ticker, &e))
            .map_err(at(Stage::Pricing))?;

        enter(ticker, Stage::Persisting);
        let alignment = align(ticker, &daily, &bars);
        out.unmatched_sentiment_days = alignment.unmatched_sentiment_days;
        if alignment.unmatched_sentiment_days > 0 {
            tracing::debug!(
                target: "pipeline",
                ticker,
                days = alignment.unmatched_sentiment_days,
                "sentiment days without a trading price were not persisted"
            );
        }
        out.rows_upserted = self
            .store
            .upsert(&alignment.rows)
            .map_err(PipelineError::from)
            .map_err(at(Stage::Persisting))?;
        counter!(m::ROWS_UPSERTED).increment(out.rows_upserted as u64);

        enter(ticker, Stage::Analyzing);
        let result = analyze(self.store.as_ref(), ticker, self.params)
            .map_err(PipelineError::from)
            .map_err(at(Stage::Analyzing))?;
        out.correlation = Some(result);

        if let Some(dir) = &self.results_dir {
            out.chart = self.write_chart(dir, ticker);
        }
        Ok(())
    }

    /// Earliest sentiment date through the later of (latest + horizon) and today.
    fn price_range(&self, daily: &std::collections::BTreeMap<NaiveDate, f64>) -> (NaiveDate, NaiveDate) {
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let first = daily.keys().next().copied().unwrap_or(today);
        let last = daily.keys().next_back().copied().unwrap_or(today);
        let fwd = i64::try_from(self.params.horizon_days)
            .ok()
            .and_then(Duration::try_days)
            .and_then(|h| last.checked_add_signed(h))
            .unwrap_or(today);
        (first, fwd.max(today))
    }

    fn write_chart(&self, dir: &std::path::Path, ticker: &str) -> Option<PathBuf> {
        let written = self
            .store
            .query(ticker, None, None)
            .map_err(anyhow::Error::from)
            .and_then(|rows| report::write_chart(dir, ticker, &rows));
        match written {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(target: "pipeline", ticker, error = %e, "chart not written");
                None
            }
        }
    }
}

fn enter(ticker: &str, stage: Stage) {
    tracing::debug!(target: "pipeline", ticker, stage = %stage, "stage");
}
