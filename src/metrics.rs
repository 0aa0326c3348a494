//! Prometheus metrics for batch runs.
//!
//! There is no long-lived HTTP endpoint; the rendered exposition is written to
//! a textfile at the end of a run for a node-exporter style collector.

use anyhow::Context;
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::Path;

pub const HEADLINES_SCRAPED: &str = "pipeline_headlines_scraped_total";
pub const HEADLINES_SCORED: &str = "pipeline_headlines_scored_total";
pub const SOURCE_ERRORS: &str = "pipeline_source_errors_total";
pub const ROWS_UPSERTED: &str = "pipeline_rows_upserted_total";
pub const TICKERS: &str = "pipeline_tickers_total";
pub const TICKER_DURATION_MS: &str = "pipeline_ticker_duration_ms";
pub const PARSE_MS: &str = "pipeline_parse_ms";
pub const LAST_RUN_TS: &str = "pipeline_last_run_ts";

/// Register descriptions with the current recorder (first call only).
pub fn ensure_described() {
    static DESCRIBED: OnceCell<()> = OnceCell::new();
    DESCRIBED.get_or_init(|| {
        describe_counter!(HEADLINES_SCRAPED, "Headlines extracted from news pages.");
        describe_counter!(HEADLINES_SCORED, "Headlines passed through the sentiment scorer.");
        describe_counter!(SOURCE_ERRORS, "Failed headline/price fetches by source.");
        describe_counter!(ROWS_UPSERTED, "Daily rows written to the store.");
        describe_counter!(TICKERS, "Tickers finished, by terminal status.");
        describe_histogram!(TICKER_DURATION_MS, Unit::Milliseconds, "Wall time of one ticker pass.");
        describe_histogram!(PARSE_MS, Unit::Milliseconds, "News page parse time.");
        describe_gauge!(LAST_RUN_TS, Unit::Seconds, "Unix time the last run finished.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder.
    pub fn install() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Stamp the run end and write the exposition, creating parent dirs.
    pub fn write_textfile(&self, path: &Path) -> anyhow::Result<()> {
        mark_run_finished();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        std::fs::write(path, self.render())
            .with_context(|| format!("writing metrics to {}", path.display()))?;
        tracing::debug!(target: "pipeline", path = %path.display(), "metrics textfile written");
        Ok(())
    }
}

pub fn mark_run_finished() {
    gauge!(LAST_RUN_TS).set(chrono::Utc::now().timestamp() as f64);
}
