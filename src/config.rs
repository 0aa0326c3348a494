// src/config.rs
//! Run configuration: tickers, analysis windows, pacing, storage and output paths.
//!
//! Lookup order for the file:
//! 1) explicit path (CLI `--config`)
//! 2) `$PIPELINE_CONFIG_PATH`
//! 3) `config/pipeline.toml` if present
//! 4) built-in defaults
//!
//! Environment overrides are applied on top of whatever was loaded.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::{CorrelationParams, DEFAULT_MIN_SAMPLE_SIZE};
use crate::error::PipelineError;
use crate::ingest::finviz::{DEFAULT_URL_TEMPLATE, DEFAULT_USER_AGENT};

pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const ENV_TICKERS: &str = "PIPELINE_TICKERS";
pub const ENV_DB_PATH: &str = "PIPELINE_DB_PATH";
pub const ENV_SCRAPER_DELAY: &str = "PIPELINE_SCRAPER_DELAY_SECONDS";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

const MAX_TICKER_LEN: usize = 10;
/// Upper bound for lag and horizon windows (about ten years of days).
pub const MAX_WINDOW_DAYS: usize = 3650;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tickers: Vec<String>,
    pub sentiment_lag_days: usize,
    pub price_change_horizon_days: usize,
    /// Minimum spacing between outbound requests, shared by all sources.
    pub scraper_delay_seconds: f64,
    pub min_sample_size: usize,
    pub results_dir: PathBuf,
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    /// Where to write the Prometheus exposition at the end of a run.
    pub metrics_textfile: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// `{ticker}` is substituted.
    pub url_template: String,
    pub user_agent: String,
    /// Fixed offset of the news source's clock (US Eastern standard = -5).
    pub source_utc_offset_hours: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tickers: ["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sentiment_lag_days: 1,
            price_change_horizon_days: 1,
            scraper_delay_seconds: 1.0,
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            results_dir: PathBuf::from("sentiment_analysis_results"),
            database: DatabaseConfig::default(),
            scraper: ScraperConfig::default(),
            metrics_textfile: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/sentiment.db"),
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            source_utc_offset_hours: -5,
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit file. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self, PipelineError> {
        let content = fs::read_to_string(path)
            .map_err(|e| PipelineError::config(format!("reading {}: {e}", path.display())))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: PipelineConfig = if ext == "json" {
            serde_json::from_str(&content)
                .map_err(|e| PipelineError::config(format!("parsing {}: {e}", path.display())))?
        } else {
            toml::from_str(&content)
                .map_err(|e| PipelineError::config(format!("parsing {}: {e}", path.display())))?
        };
        Ok(cfg)
    }

    /// Resolve the file per the lookup order, then apply env overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, PipelineError> {
        let mut cfg = if let Some(p) = explicit {
            Self::load_from(p)?
        } else if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(PipelineError::config(format!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                )));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_PATH))?
        } else {
            tracing::debug!(target: "config", "no config file found, using defaults");
            Self::default()
        };
        cfg.apply_env_overrides()?;
        cfg.tickers = clean_tickers(std::mem::take(&mut cfg.tickers));
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), PipelineError> {
        if let Ok(v) = std::env::var(ENV_TICKERS) {
            self.tickers = v.split(',').map(|s| s.to_string()).collect();
        }
        if let Ok(v) = std::env::var(ENV_DB_PATH) {
            self.database.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_SCRAPER_DELAY) {
            self.scraper_delay_seconds = v.trim().parse::<f64>().map_err(|_| {
                PipelineError::config(format!("{ENV_SCRAPER_DELAY}={v:?} is not a number"))
            })?;
        }
        Ok(())
    }

    /// Fatal-at-startup checks; nothing runs when this fails.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.tickers.is_empty() {
            return Err(PipelineError::config("ticker list is empty"));
        }
        if let Some(bad) = self.tickers.iter().find(|t| !is_valid_ticker(t)) {
            return Err(PipelineError::config(format!("invalid ticker symbol {bad:?}")));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(PipelineError::config("database.path is missing"));
        }
        if !self.scraper_delay_seconds.is_finite() || self.scraper_delay_seconds < 0.0 {
            return Err(PipelineError::config(format!(
                "scraper_delay_seconds must be >= 0, got {}",
                self.scraper_delay_seconds
            )));
        }
        if self.price_change_horizon_days == 0 {
            return Err(PipelineError::config("price_change_horizon_days must be >= 1"));
        }
        if self.price_change_horizon_days > MAX_WINDOW_DAYS {
            return Err(PipelineError::config(format!(
                "price_change_horizon_days must be <= {MAX_WINDOW_DAYS}, got {}",
                self.price_change_horizon_days
            )));
        }
        if self.sentiment_lag_days > MAX_WINDOW_DAYS {
            return Err(PipelineError::config(format!(
                "sentiment_lag_days must be <= {MAX_WINDOW_DAYS}, got {}",
                self.sentiment_lag_days
            )));
        }
        if self.min_sample_size < 2 {
            return Err(PipelineError::config("min_sample_size must be >= 2"));
        }
        if !self.scraper.url_template.contains("{ticker}") {
            return Err(PipelineError::config("scraper.url_template lacks {ticker}"));
        }
        if !(-12..=14).contains(&self.scraper.source_utc_offset_hours) {
            return Err(PipelineError::config(format!(
                "scraper.source_utc_offset_hours out of range: {}",
                self.scraper.source_utc_offset_hours
            )));
        }
        Ok(())
    }

    pub fn correlation_params(&self) -> CorrelationParams {
        CorrelationParams {
            lag_days: self.sentiment_lag_days,
            horizon_days: self.price_change_horizon_days,
            min_sample_size: self.min_sample_size,
        }
    }

    pub fn source_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.scraper.source_utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }
}

/// Trim, upper-case, drop empties and duplicates (first occurrence wins).
pub fn clean_tickers(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim().to_ascii_uppercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

fn is_valid_ticker(t: &str) -> bool {
    !t.is_empty()
        && t.len() <= MAX_TICKER_LEN
        && t.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
}
