//! # Correlation
//! Lagged sentiment vs. forward price change, per ticker.
//!
//! For rows ordered by date:
//! `change[i] = (price[i + horizon] - price[i]) / price[i]`, paired with
//! `sentiment[i - lag]`. Points with a missing price, a zero base price or a
//! missing lagged sentiment are dropped. The Pearson coefficient is reported
//! only when at least `min_sample_size` pairs survive.

use serde::Serialize;

use crate::store::{DailyStore, StoreError, StoredRow};

pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorrelationParams {
    pub lag_days: usize,
    pub horizon_days: usize,
    pub min_sample_size: usize,
}

impl Default for CorrelationParams {
    fn default() -> Self {
        Self {
            lag_days: 1,
            horizon_days: 1,
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStatus {
    Computed,
    /// Fewer valid pairs than the minimum sample size.
    InsufficientData,
    /// Enough pairs, but one side is constant.
    ZeroVariance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub ticker: String,
    pub lag_days: usize,
    pub horizon_days: usize,
    pub coefficient: Option<f64>,
    pub sample_size: usize,
    pub status: CorrelationStatus,
}

impl CorrelationResult {
    pub fn is_reliable(&self) -> bool {
        self.status == CorrelationStatus::Computed
    }
}

impl std::fmt::Display for CorrelationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status, self.coefficient) {
            (CorrelationStatus::Computed, Some(r)) => write!(
                f,
                "r={:+.4} (n={}, lag={}d, horizon={}d)",
                r, self.sample_size, self.lag_days, self.horizon_days
            ),
            (CorrelationStatus::ZeroVariance, _) => {
                write!(f, "undefined: constant series (n={})", self.sample_size)
            }
            _ => write!(f, "insufficient data (n={})", self.sample_size),
        }
    }
}

/// `(lagged sentiment, forward price change)` pairs.
pub fn lagged_pairs(rows: &[StoredRow], lag_days: usize, horizon_days: usize) -> Vec<(f64, f64)> {
    let mut out = Vec::new();
    for i in lag_days..rows.len() {
        let Some(fwd) = i.checked_add(horizon_days).and_then(|j| rows.get(j)) else {
            break;
        };
        let (Some(p0), Some(p1)) = (rows[i].adj_close, fwd.adj_close) else {
            continue;
        };
        if p0 == 0.0 {
            continue;
        }
        let Some(sent) = rows[i - lag_days].sentiment_score else {
            continue;
        };
        let change = (p1 - p0) / p0;
        if change.is_finite() {
            out.push((sent, change));
        }
    }
    out
}

/// Pearson coefficient; `None` when either series has zero variance.
/// Zero is judged relative to each series' magnitude.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / nf;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let floor = |scale: f64| nf * (scale * 1e-12).powi(2);
    let scale_x = pairs.iter().fold(0.0_f64, |m, p| m.max(p.0.abs()));
    let scale_y = pairs.iter().fold(0.0_f64, |m, p| m.max(p.1.abs()));
    if sxx <= floor(scale_x) || syy <= floor(scale_y) {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// Pure correlation over already-loaded rows (must be ordered by date).
pub fn correlate(ticker: &str, rows: &[StoredRow], params: CorrelationParams) -> CorrelationResult {
    let pairs = lagged_pairs(rows, params.lag_days, params.horizon_days);
    let min = params.min_sample_size.max(2);
    let sample_size = pairs.len();

    let (coefficient, status) = if sample_size < min {
        (None, CorrelationStatus::InsufficientData)
    } else {
        match pearson(&pairs) {
            Some(r) => (Some(r), CorrelationStatus::Computed),
            None => (None, CorrelationStatus::ZeroVariance),
        }
    };

    CorrelationResult {
        ticker: ticker.to_string(),
        lag_days: params.lag_days,
        horizon_days: params.horizon_days,
        coefficient,
        sample_size,
        status,
    }
}

/// Read every persisted row for `ticker` and correlate.
pub fn analyze(
    store: &dyn DailyStore,
    ticker: &str,
    params: CorrelationParams,
) -> Result<CorrelationResult, StoreError> {
    let rows = store.query(ticker, None, None)?;
    let result = correlate(ticker, &rows, params);
    tracing::debug!(
        target: "analysis",
        ticker,
        rows = rows.len(),
        sample_size = result.sample_size,
        status = ?result.status,
        "correlation computed"
    );
    Ok(result)
}
