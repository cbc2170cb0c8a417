//! Payment status polling domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a wallet artifact as reported by the status endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArtifactStatus {
    #[serde(alias = "NOTPAY")]
    Pending,
    Progress,
    Success,
    Failed,
    Cancelled,
    Closed,
    #[serde(other)]
    Unknown,
}

impl ArtifactStatus {
    /// Statuses after which the artifact can no longer be paid
    pub fn is_failure(&self) -> bool {
        matches!(self, ArtifactStatus::Failed | ArtifactStatus::Cancelled | ArtifactStatus::Closed)
    }

    pub fn is_terminal(&self) -> bool {
        *self == ArtifactStatus::Success || self.is_failure()
    }
}

/// What the poller reports back to the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Guest is paying; keep the artifact
    Progress,
    /// Artifact paid. Polling stopped.
    Succeeded,
    /// Artifact failed or was cancelled. Polling stopped.
    NeedsRefresh(ArtifactStatus),
    /// Budget exhausted. Polling stopped.
    TimedOut,
    /// A status query failed. Polling stopped.
    TransportFailed(String),
}

impl PollEvent {
    /// Whether the poller stopped after emitting this event
    pub fn is_final(&self) -> bool {
        !matches!(self, PollEvent::Progress)
    }
}

/// Bookkeeping for one poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    pub artifact_id: String,
    pub started_at: DateTime<Utc>,
    pub budget_seconds: u64,
    pub last_observed_status: Option<ArtifactStatus>,
}

impl PollState {
    pub fn new(artifact_id: impl Into<String>, started_at: DateTime<Utc>, budget_seconds: u64) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            started_at,
            budget_seconds,
            last_observed_status: None,
        }
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds()
    }

    pub fn budget_exhausted(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_seconds(now) >= self.budget_seconds as i64
    }

    /// Record a status and translate it into the event to emit, if any
    pub fn observe(&mut self, status: ArtifactStatus) -> Option<PollEvent> {
        self.last_observed_status = Some(status);
        match status {
            ArtifactStatus::Success => Some(PollEvent::Succeeded),
            s if s.is_failure() => Some(PollEvent::NeedsRefresh(s)),
            ArtifactStatus::Progress => Some(PollEvent::Progress),
            // Pending and unrecognised statuses keep the loop going silently
            _ => None,
        }
    }
}
