//! Ticker sentiment pipeline: binary entrypoint.
//! Loads configuration, opens the store, runs every ticker once and writes
//! the run summary.
//!
//! Exit status is non-zero on configuration errors and when the run was
//! aborted because the store became unavailable; individual ticker failures
//! are reported but do not fail the process.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ticker_sentiment_pipeline::config::{clean_tickers, PipelineConfig};
use ticker_sentiment_pipeline::ingest::finviz::FinvizHeadlineSource;
use ticker_sentiment_pipeline::ingest::yahoo::YahooPriceSource;
use ticker_sentiment_pipeline::ingest::RequestGate;
use ticker_sentiment_pipeline::metrics::Metrics;
use ticker_sentiment_pipeline::{report, Pipeline, SentimentScorer, SqliteStore};

#[derive(Parser)]
#[command(
    name = "ticker-sentiment-pipeline",
    about = "Scrape headlines, score sentiment, store daily rows, correlate with price"
)]
struct Cli {
    /// Path to a TOML or JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for chart series and the run summary.
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Ticker to process (repeatable); replaces the configured list.
    #[arg(long = "ticker")]
    tickers: Vec<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut cfg = PipelineConfig::load(cli.config.as_deref())?;
    if !cli.tickers.is_empty() {
        cfg.tickers = clean_tickers(cli.tickers.clone());
    }
    if let Some(dir) = &cli.results_dir {
        cfg.results_dir = dir.clone();
    }
    if let Some(db) = &cli.db_path {
        cfg.database.path = db.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; no-op otherwise.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = load_config(&cli).context("invalid configuration")?;

    let metrics = match Metrics::install() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            None
        }
    };

    let store = SqliteStore::open(&cfg.database.path)
        .with_context(|| format!("opening database {}", cfg.database.path.display()))?;
    store.ensure_schema().context("creating schema")?;

    let offset = cfg.source_offset();
    let gate = RequestGate::from_secs_f64(cfg.scraper_delay_seconds);
    let headlines = FinvizHeadlineSource::from_url_template(
        cfg.scraper.url_template.clone(),
        &cfg.scraper.user_agent,
        gate.clone(),
        offset,
    )?;
    let prices = YahooPriceSource::new(gate, offset);

    tracing::info!(
        tickers = ?cfg.tickers,
        lag = cfg.sentiment_lag_days,
        horizon = cfg.price_change_horizon_days,
        db = %cfg.database.path.display(),
        "pipeline starting"
    );

    let mut pipeline = Pipeline::new(
        Box::new(headlines),
        Box::new(prices),
        Box::new(SentimentScorer::load()),
        Box::new(store),
        cfg.correlation_params(),
    )
    .with_results_dir(cfg.results_dir.clone());

    let summary = pipeline.run(&cfg.tickers).await;
    println!("{summary}");

    match report::write_run_summary(&cfg.results_dir, &summary) {
        Ok(p) => tracing::info!(path = %p.display(), "run summary written"),
        Err(e) => tracing::warn!(error = %e, "run summary not written"),
    }
    if let (Some(m), Some(path)) = (&metrics, &cfg.metrics_textfile) {
        if let Err(e) = m.write_textfile(path) {
            tracing::warn!(error = %e, "metrics textfile not written");
        }
    }

    if let Some(reason) = &summary.aborted {
        bail!("run aborted: {reason}");
    }
    Ok(())
}
