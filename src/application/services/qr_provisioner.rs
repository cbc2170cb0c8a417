//! QR Provisioner
//!
//! Requests a wallet payment artifact for an order and classifies its payload.

use std::time::Duration;

use tracing::{debug, info};

use crate::domain::{ArtifactPayload, OrderSnapshot, PaymentArtifact, PaymentChannel};
use crate::infrastructure::adapters::{CheckoutApiRef, SessionMetrics, TimeSourceRef};
use crate::shared::error::SessionFailure;

pub struct QrProvisioner {
    api: CheckoutApiRef,
    time: TimeSourceRef,
    timeout: Duration,
    metrics: SessionMetrics,
}

impl QrProvisioner {
    pub fn new(api: CheckoutApiRef, time: TimeSourceRef, timeout: Duration, metrics: SessionMetrics) -> Self {
        Self {
            api,
            time,
            timeout,
            metrics,
        }
    }

    /// Provision an artifact for `channel`.
    ///
    /// Returns `Ok(None)` without a request when the order is already paid.
    pub async fn provision(
        &self,
        order: &OrderSnapshot,
        channel: PaymentChannel,
        link_token: &str,
    ) -> Result<Option<PaymentArtifact>, SessionFailure> {
        if order.is_paid() {
            debug!(order_id = %order.order_id, channel = %channel, "Order already paid, skipping provisioning");
            return Ok(None);
        }

        self.metrics.provision_requests.inc();
        let raw = tokio::time::timeout(
            self.timeout,
            self.api.provision_payment(&order.order_id, channel, link_token),
        )
        .await
        .map_err(|_| {
            SessionFailure::ProvisionError(format!("Provisioning timed out after {}s", self.timeout.as_secs()))
        })?
        .map_err(|e| e.into_provision_failure())?;

        if raw.artifact_id.trim().is_empty() {
            return Err(SessionFailure::ProvisionError("Artifact id missing".to_string()));
        }
        if raw.payload.trim().is_empty() {
            return Err(SessionFailure::ProvisionError("Artifact payload missing".to_string()));
        }

        let payload = ArtifactPayload::classify(&raw.payload);
        let issued_at = raw.issued_at.unwrap_or_else(|| self.time.now());

        info!(
            order_id = %order.order_id,
            channel = %channel,
            artifact_id = %raw.artifact_id,
            inline_image = payload.is_inline_image(),
            issued_at = %issued_at,
            "Payment artifact issued"
        );

        Ok(Some(PaymentArtifact {
            artifact_id: raw.artifact_id,
            channel,
            payload,
            issued_at,
        }))
    }
}
