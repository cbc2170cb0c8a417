//! Order Session Loader
//!
//! Fetches the order snapshot for a (language, token) pair. Loads are
//! idempotent, bounded by a timeout, and safe to issue while timers run.

use std::time::Duration;

use tracing::{debug, info};

use crate::domain::OrderSnapshot;
use crate::infrastructure::adapters::{CheckoutApiRef, SessionMetrics};
use crate::shared::error::SessionFailure;

pub struct OrderSessionLoader {
    api: CheckoutApiRef,
    timeout: Duration,
    metrics: SessionMetrics,
}

impl OrderSessionLoader {
    pub fn new(api: CheckoutApiRef, timeout: Duration, metrics: SessionMetrics) -> Self {
        Self { api, timeout, metrics }
    }

    /// Load the order snapshot.
    ///
    /// `silent` only lowers log verbosity here; the loading indicator belongs
    /// to the reconciler.
    pub async fn load(&self, language: &str, token: &str, silent: bool) -> Result<OrderSnapshot, SessionFailure> {
        if silent {
            debug!(language = %language, "Silently refreshing order snapshot");
        } else {
            info!(language = %language, "Loading order snapshot");
        }
        self.metrics.order_loads.inc();

        match tokio::time::timeout(self.timeout, self.api.fetch_order(language, token)).await {
            Ok(Ok(order)) => {
                debug!(
                    order_id = %order.order_id,
                    payment_type = ?order.payment_type,
                    payment_state = ?order.payment_state,
                    is_guaranteed = order.is_guaranteed,
                    "Order snapshot loaded"
                );
                Ok(order)
            }
            Ok(Err(e)) => Err(e.into_load_failure()),
            Err(_) => Err(SessionFailure::ServerError(format!(
                "Order load timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}
