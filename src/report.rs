//! Run artifacts: per-ticker chart series (CSV) and the JSON run summary.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::pipeline::RunSummary;
use crate::store::StoredRow;

/// Rolling window for the smoothed sentiment column.
pub const SMOOTHING_WINDOW: usize = 7;
/// Non-null values required inside the window before a mean is emitted.
pub const SMOOTHING_MIN_VALUES: usize = 3;

pub const SUMMARY_FILE: &str = "run_summary.json";

/// Trailing mean over `window` rows, ignoring `None`; `None` until at least
/// `min_values` non-null entries are inside the window.
pub fn rolling_mean(values: &[Option<f64>], window: usize, min_values: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let lo = (i + 1).saturating_sub(window);
            let present: Vec<f64> = values[lo..=i].iter().flatten().copied().collect();
            if present.len() >= min_values.max(1) {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            } else {
                None
            }
        })
        .collect()
}

/// Price and sentiment on a shared date axis, plus the smoothed sentiment.
pub fn export_chart_csv(rows: &[StoredRow]) -> Result<String> {
    let sentiment: Vec<Option<f64>> = rows.iter().map(|r| r.sentiment_score).collect();
    let smoothed = rolling_mean(&sentiment, SMOOTHING_WINDOW, SMOOTHING_MIN_VALUES);

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "adj_close", "sentiment_score", "sentiment_7d_avg"])?;
    for (row, avg) in rows.iter().zip(smoothed) {
        wtr.write_record([
            row.date.format("%Y-%m-%d").to_string(),
            fmt_opt(row.adj_close, 4),
            fmt_opt(row.sentiment_score, 6),
            fmt_opt(avg, 6),
        ])?;
    }
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

pub fn chart_path(dir: &Path, ticker: &str) -> PathBuf {
    dir.join(format!("{ticker}_sentiment_vs_price.csv"))
}

/// Write `<dir>/<TICKER>_sentiment_vs_price.csv`.
pub fn write_chart(dir: &Path, ticker: &str, rows: &[StoredRow]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = chart_path(dir, ticker);
    let body = export_chart_csv(rows)?;
    std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Write `<dir>/run_summary.json`.
pub fn write_run_summary(dir: &Path, summary: &RunSummary) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(summary).context("failed to serialize run summary")?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn fmt_opt(v: Option<f64>, places: usize) -> String {
    match v {
        Some(x) => format!("{:.*}", places, x),
        None => String::new(),
    }
}
