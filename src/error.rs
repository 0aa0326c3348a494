// src/error.rs
//! Error taxonomy for one pipeline run.
//!
//! Source and store failures are ticker-scoped; configuration failures are
//! fatal before the first ticker. Low-confidence correlation is not an error
//! (see `analysis::CorrelationStatus`).

use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Which leaf source failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Headlines,
    Prices,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Headlines => f.write_str("headline"),
            SourceKind::Prices => f.write_str("price"),
        }
    }
}

/// Failure reported by a headline or price source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("remote returned HTTP {0}")]
    Status(u16),

    #[error("page layout not recognized: {0}")]
    Layout(String),

    #[error("no data returned")]
    Empty,

    #[error("{0}")]
    Remote(String),
}

/// Errors surfaced to the orchestrator or to the binary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{kind} source unavailable for {ticker}: {reason}")]
    SourceUnavailable {
        kind: SourceKind,
        ticker: String,
        reason: String,
    },

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn source_unavailable(kind: SourceKind, ticker: &str, err: &SourceError) -> Self {
        PipelineError::SourceUnavailable {
            kind,
            ticker: ticker.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            PipelineError::Persistence(_) => ErrorKind::Persistence,
            PipelineError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

/// Flat, serializable classification used in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceUnavailable,
    Persistence,
    Configuration,
    /// Ticker never ran because the run was aborted earlier.
    Aborted,
}
