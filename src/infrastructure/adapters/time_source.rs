//! Wall-clock sources
//!
//! Countdown and poll budgets are computed against wall-clock time. The tokio
//! source anchors wall-clock time on tokio's clock so paused-time tests and
//! production share one code path.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of "now"
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type TimeSourceRef = Arc<dyn TimeSource>;

/// System wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock derived from `tokio::time::Instant`, which honours paused time
#[derive(Debug, Clone, Copy)]
pub struct TokioTimeSource {
    wall_anchor: DateTime<Utc>,
    instant_anchor: tokio::time::Instant,
}

impl TokioTimeSource {
    pub fn new(wall_anchor: DateTime<Utc>) -> Self {
        Self {
            wall_anchor,
            instant_anchor: tokio::time::Instant::now(),
        }
    }

    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }
}

impl TimeSource for TokioTimeSource {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now().saturating_duration_since(self.instant_anchor);
        self.wall_anchor
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}
