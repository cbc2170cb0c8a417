//! Countdown Clock
//!
//! Ticks at 1 Hz, recomputing the remaining time from the absolute reference on
//! every tick. Expiry is reported exactly once, after which the loop ends.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::domain::CountdownState;
use crate::infrastructure::adapters::TimeSourceRef;

const TICK: Duration = Duration::from_secs(1);

/// What the clock reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Tick { remaining_seconds: u64 },
    Expired,
}

/// Owner of at most one tick loop
pub struct CountdownClock {
    time: TimeSourceRef,
    state: Option<CountdownState>,
    task: Option<JoinHandle<()>>,
}

impl CountdownClock {
    pub fn new(time: TimeSourceRef) -> Self {
        Self {
            time,
            state: None,
            task: None,
        }
    }

    /// Start counting down from `state`, cancelling any previous loop first.
    ///
    /// Display-only states report the placeholder once and never expire.
    pub fn start<F>(&mut self, state: CountdownState, on_event: F)
    where
        F: Fn(ClockEvent) + Send + 'static,
    {
        self.cancel();
        self.state = Some(state);

        if state.is_display_only() {
            on_event(ClockEvent::Tick {
                remaining_seconds: state.placeholder_seconds,
            });
            return;
        }

        let time = self.time.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let remaining_seconds = state.remaining_seconds(time.now());
                on_event(ClockEvent::Tick { remaining_seconds });
                if remaining_seconds == 0 {
                    on_event(ClockEvent::Expired);
                    break;
                }
            }
        }));
    }

    /// Stop the tick loop, if any. No event is delivered after this returns.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Remaining time of the current countdown, computed now
    pub fn remaining_seconds(&self) -> Option<u64> {
        self.state.map(|state| state.remaining_seconds(self.time.now()))
    }
}

impl Drop for CountdownClock {
    fn drop(&mut self) {
        self.cancel();
    }
}
