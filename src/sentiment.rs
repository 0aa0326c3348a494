//! # Sentiment scoring
//! Compound polarity per headline using the VADER lexicon.
//!
//! The analyzer is built once by [`SentimentScorer::load`] and passed by
//! reference wherever scoring happens; there is no hidden global instance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use vader_sentiment::SentimentIntensityAnalyzer;

use crate::ingest::HeadlineRecord;

/// Anything that can turn a headline into a compound score in `[-1, 1]`.
pub trait HeadlineScorer: Send + Sync {
    fn score(&self, text: &str) -> f64;
}

/// VADER-backed scorer handle.
pub struct SentimentScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl SentimentScorer {
    /// Build the analyzer (lexicon load happens here, once).
    pub fn load() -> Self {
        let analyzer = SentimentIntensityAnalyzer::new();
        tracing::debug!(target: "sentiment", "VADER analyzer initialized");
        Self { analyzer }
    }
}

impl HeadlineScorer for SentimentScorer {
    fn score(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }
        let compound = self
            .analyzer
            .polarity_scores(text)
            .get("compound")
            .copied()
            .unwrap_or(0.0);
        if compound.is_finite() {
            compound.clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }
}

/// A headline reduced to its calendar date and score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHeadline {
    pub ticker: String,
    pub date: NaiveDate,
    pub score: f64,
}

/// Score every headline of one ticker pass.
pub fn score_headlines(scorer: &dyn HeadlineScorer, headlines: &[HeadlineRecord]) -> Vec<ScoredHeadline> {
    headlines
        .iter()
        .map(|h| ScoredHeadline {
            ticker: h.ticker.clone(),
            date: h.date(),
            score: scorer.score(&h.headline),
        })
        .collect()
}
