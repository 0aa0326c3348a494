// src/ingest/rate_limit.rs
//! Process-wide request pacing shared by every outbound fetch.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Fixed-interval gate: at most one request per `interval`, burst of one.
///
/// Clones share the same bucket, so handing a clone to each source keeps a
/// single run-wide ceiling no matter how many sources or tickers are involved.
#[derive(Clone, Debug)]
pub struct RequestGate {
    limiter: Option<SharedRateLimiter>,
    interval: Duration,
}

impl RequestGate {
    /// A zero interval disables pacing.
    pub fn new(interval: Duration) -> Self {
        let limiter = Quota::with_period(interval).map(|q| Arc::new(RateLimiter::direct(q)));
        Self { limiter, interval }
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::unlimited();
        }
        Self::new(Duration::from_secs_f64(secs))
    }

    pub fn unlimited() -> Self {
        Self {
            limiter: None,
            interval: Duration::ZERO,
        }
    }

    /// Wait until the next request slot is available.
    pub async fn wait(&self) {
        if let Some(l) = &self.limiter {
            l.until_ready().await;
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
