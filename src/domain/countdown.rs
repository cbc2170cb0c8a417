//! Countdown arithmetic
//!
//! Remaining time is always recomputed from an absolute reference so a
//! suspended process never drifts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Countdown anchored on an absolute timestamp
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountdownState {
    pub duration_seconds: u64,
    /// `None` means display-only: the placeholder is shown and nothing expires
    pub reference: Option<DateTime<Utc>>,
    pub placeholder_seconds: u64,
}

impl CountdownState {
    pub fn new(reference: Option<DateTime<Utc>>, duration_seconds: u64, placeholder_seconds: u64) -> Self {
        Self {
            duration_seconds,
            reference,
            placeholder_seconds,
        }
    }

    /// `max(0, duration - (now - reference))`
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        match self.reference {
            Some(reference) => remaining_seconds(reference, self.duration_seconds, now),
            None => self.placeholder_seconds,
        }
    }

    pub fn is_display_only(&self) -> bool {
        self.reference.is_none()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_display_only() && self.remaining_seconds(now) == 0
    }
}

/// Remaining whole seconds of a countdown started at `reference`.
///
/// A reference in the future (client clock behind the server) clamps to the
/// full duration.
pub fn remaining_seconds(reference: DateTime<Utc>, duration_seconds: u64, now: DateTime<Utc>) -> u64 {
    let elapsed_ms = (now - reference).num_milliseconds().max(0) as u64;
    let duration_ms = duration_seconds.saturating_mul(1000);
    // Round up so the display only reads 0 once the full duration has elapsed
    duration_ms.saturating_sub(elapsed_ms).div_ceil(1000)
}
