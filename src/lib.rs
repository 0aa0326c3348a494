// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod analysis;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod sentiment;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::analysis::{CorrelationParams, CorrelationResult, CorrelationStatus};
pub use crate::config::PipelineConfig;
pub use crate::error::{ErrorKind, PipelineError, SourceError, SourceKind};
pub use crate::pipeline::{Pipeline, RunSummary, Stage, TickerOutcome, TickerStatus};
pub use crate::sentiment::{HeadlineScorer, SentimentScorer};
pub use crate::store::{DailyRow, DailyStore, Field, SqliteStore, StoreError, StoredRow};
