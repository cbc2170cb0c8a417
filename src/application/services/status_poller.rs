//! Status Poller
//!
//! Queries the payment status of one artifact at a fixed cadence until a
//! terminal status, the polling budget, a transport error, or cancellation.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::domain::{PollEvent, PollState};
use crate::infrastructure::adapters::{CheckoutApiRef, SessionMetrics, TimeSourceRef};

/// Owner of at most one poll loop
pub struct StatusPoller {
    api: CheckoutApiRef,
    time: TimeSourceRef,
    interval: Duration,
    metrics: SessionMetrics,
    artifact_id: Option<String>,
    task: Option<JoinHandle<()>>,
}

impl StatusPoller {
    pub fn new(api: CheckoutApiRef, time: TimeSourceRef, interval: Duration, metrics: SessionMetrics) -> Self {
        Self {
            api,
            time,
            interval,
            metrics,
            artifact_id: None,
            task: None,
        }
    }

    /// Start polling for `state.artifact_id`, cancelling any previous loop first.
    ///
    /// The first query runs one interval after start. Budget exhaustion emits
    /// [`PollEvent::TimedOut`] without another query.
    pub fn start<F>(&mut self, mut state: PollState, on_event: F)
    where
        F: Fn(PollEvent) + Send + 'static,
    {
        self.cancel();
        self.artifact_id = Some(state.artifact_id.clone());

        let api = self.api.clone();
        let time = self.time.clone();
        let metrics = self.metrics.clone();
        let period = self.interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if state.budget_exhausted(time.now()) {
                    debug!(
                        artifact_id = %state.artifact_id,
                        budget_seconds = state.budget_seconds,
                        "Polling budget exhausted"
                    );
                    on_event(PollEvent::TimedOut);
                    break;
                }

                metrics.poll_requests.inc();
                match api.payment_status(&state.artifact_id).await {
                    Ok(status) => {
                        debug!(artifact_id = %state.artifact_id, status = ?status, "Payment status observed");
                        if let Some(event) = state.observe(status) {
                            let last = event.is_final();
                            on_event(event);
                            if last {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(artifact_id = %state.artifact_id, error = %e, "Payment status query failed");
                        on_event(PollEvent::TransportFailed(e.to_string()));
                        break;
                    }
                }
            }
        }));
    }

    /// Stop the poll loop, if any. No query is issued after this returns.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.artifact_id = None;
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Artifact of the live loop
    pub fn artifact_id(&self) -> Option<&str> {
        if self.is_active() {
            self.artifact_id.as_deref()
        } else {
            None
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.cancel();
    }
}
