//! Checkout backend adapter
//!
//! This adapter handles HTTP communication with the checkout backend that owns
//! the order record, wallet artifacts and card guarantees.

use crate::{
    config::ApiConfig,
    domain::{ArtifactStatus, GuaranteeCard, OrderSnapshot, PaymentChannel},
    shared::error::{AppError, AppResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Envelope code meaning success
pub const SUCCESS_CODE: i64 = 200;

/// Response envelope shared by every checkout endpoint
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Raw provisioning result before payload classification
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedArtifact {
    pub artifact_id: String,
    pub payload: String,
    #[serde(default, deserialize_with = "crate::domain::order::deserialize_lenient_timestamp")]
    pub issued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: ArtifactStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionRequest<'a> {
    order_id: &'a str,
    channel: PaymentChannel,
    link_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GuaranteeRequest<'a> {
    order_id: &'a str,
    card: &'a GuaranteeCard,
    link_token: &'a str,
}

/// The services a checkout session consumes
#[async_trait]
pub trait CheckoutApi: Send + Sync {
    /// `GET order-info(language, token)`; idempotent
    async fn fetch_order(&self, language: &str, token: &str) -> AppResult<OrderSnapshot>;

    /// `POST provision-payment(orderId, channel, linkToken)`
    async fn provision_payment(
        &self,
        order_id: &str,
        channel: PaymentChannel,
        link_token: &str,
    ) -> AppResult<ProvisionedArtifact>;

    /// `GET payment-status(artifactId)`; single attempt
    async fn payment_status(&self, artifact_id: &str) -> AppResult<ArtifactStatus>;

    /// `POST submit-guarantee-card(orderId, cardFields, linkToken)`
    async fn submit_guarantee_card(
        &self,
        order_id: &str,
        card: &GuaranteeCard,
        link_token: &str,
    ) -> AppResult<()>;
}

pub type CheckoutApiRef = Arc<dyn CheckoutApi>;

/// reqwest-backed checkout adapter
pub struct HttpCheckoutApi {
    config: ApiConfig,
    client: Client,
}

impl HttpCheckoutApi {
    /// Create a new adapter with a shared connection pool
    pub fn new(config: ApiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn status_url(&self, artifact_id: &str) -> AppResult<Url> {
        status_url(&self.config.base_url, artifact_id)
    }

    async fn fetch_order_once(&self, language: &str, token: &str) -> AppResult<OrderSnapshot> {
        let url = self.url("/api/order/info");
        debug!(url = %url, language = %language, "Fetching order snapshot");

        let response = self
            .client
            .get(&url)
            .query(&[("lang", language), ("token", token)])
            .send()
            .await
            .map_err(|e| AppError::ServerError(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::ServerError(format!("Failed to read response: {}", e)))?;

        decode_order(status, &body)
    }
}

#[async_trait]
impl CheckoutApi for HttpCheckoutApi {
    async fn fetch_order(&self, language: &str, token: &str) -> AppResult<OrderSnapshot> {
        if language.trim().is_empty() || token.trim().is_empty() {
            return Err(AppError::InvalidLink);
        }

        let mut last_error = AppError::ServerError("no attempt made".to_string());
        for attempt in 0..=self.config.max_retries {
            match self.fetch_order_once(language, token).await {
                Ok(order) => return Ok(order),
                Err(e) if e.is_retryable() => last_error = e,
                Err(e) => return Err(e),
            }

            if attempt < self.config.max_retries {
                info!(
                    "Order fetch failed, retrying... (attempt {}/{})",
                    attempt + 1,
                    self.config.max_retries + 1
                );
                tokio::time::sleep(Duration::from_millis(100 * (attempt + 1) as u64)).await;
            }
        }

        warn!(error = %last_error, "Order fetch exhausted retries");
        Err(last_error)
    }

    async fn provision_payment(
        &self,
        order_id: &str,
        channel: PaymentChannel,
        link_token: &str,
    ) -> AppResult<ProvisionedArtifact> {
        let url = self.url("/api/payment/provision");
        debug!(url = %url, order_id = %order_id, channel = %channel, "Provisioning payment artifact");

        let response = self
            .client
            .post(&url)
            .json(&ProvisionRequest { order_id, channel, link_token })
            .send()
            .await
            .map_err(|e| AppError::Provision(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Provision(format!("Failed to read response: {}", e)))?;

        decode_success::<ProvisionedArtifact>(status, &body)
            .map_err(|e| AppError::Provision(e.to_string()))
    }

    async fn payment_status(&self, artifact_id: &str) -> AppResult<ArtifactStatus> {
        let url = self.status_url(artifact_id)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Transport(format!("Failed to read response: {}", e)))?;

        decode_success::<StatusBody>(status, &body).map(|body| body.status)
    }

    async fn submit_guarantee_card(
        &self,
        order_id: &str,
        card: &GuaranteeCard,
        link_token: &str,
    ) -> AppResult<()> {
        let url = self.url("/api/payment/guarantee");
        debug!(url = %url, order_id = %order_id, card = ?card, "Submitting guarantee card");

        let response = self
            .client
            .post(&url)
            .json(&GuaranteeRequest { order_id, card, link_token })
            .send()
            .await
            .map_err(|e| AppError::ServerError(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::ServerError(format!("Failed to read response: {}", e)))?;

        decode_ack(status, &body)
    }
}

/// Status endpoint for `artifact_id`, with the id percent-encoded as a single path segment
pub fn status_url(base_url: &str, artifact_id: &str) -> AppResult<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| AppError::Config(format!("Invalid base URL {}: {}", base_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Config(format!("Base URL cannot carry a path: {}", base_url)))?
        .pop_if_empty()
        .extend(["api", "payment", "status", artifact_id]);
    Ok(url)
}

/// Classify an order-info response.
///
/// 404 and a failure code without data mean the link does not resolve; every
/// other anomaly is a server error.
pub fn decode_order(status: StatusCode, body: &[u8]) -> AppResult<OrderSnapshot> {
    if status == StatusCode::NOT_FOUND {
        return Err(AppError::InvalidLink);
    }
    if !status.is_success() {
        return Err(AppError::ServerError(format!("HTTP error: {}", status)));
    }

    let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| AppError::ServerError(format!("Malformed payload: {}", e)))?;

    match (envelope.code, envelope.data) {
        (SUCCESS_CODE, Some(data)) => serde_json::from_value(data)
            .map_err(|e| AppError::ServerError(format!("Malformed order: {}", e))),
        (SUCCESS_CODE, None) => Err(AppError::ServerError("Order payload missing".to_string())),
        (_, None) => Err(AppError::InvalidLink),
        (code, Some(_)) => Err(AppError::ServerError(format!(
            "Order lookup failed with code {}: {}",
            code,
            envelope.message.unwrap_or_default()
        ))),
    }
}

/// Decode a success envelope carrying `T`
pub fn decode_success<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> AppResult<T> {
    if !status.is_success() {
        return Err(AppError::ServerError(format!("HTTP error: {}", status)));
    }

    let envelope: ApiEnvelope<T> = serde_json::from_slice(body)
        .map_err(|e| AppError::ServerError(format!("Malformed payload: {}", e)))?;

    if envelope.code != SUCCESS_CODE {
        return Err(AppError::ServerError(format!(
            "Request failed with code {}: {}",
            envelope.code,
            envelope.message.unwrap_or_default()
        )));
    }

    envelope
        .data
        .ok_or_else(|| AppError::ServerError("Response payload missing".to_string()))
}

/// Decode an acknowledgement; the payload, if any, is ignored
pub fn decode_ack(status: StatusCode, body: &[u8]) -> AppResult<()> {
    if !status.is_success() {
        return Err(AppError::ServerError(format!("HTTP error: {}", status)));
    }

    let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| AppError::ServerError(format!("Malformed payload: {}", e)))?;

    if envelope.code == SUCCESS_CODE {
        Ok(())
    } else {
        Err(AppError::ServerError(envelope.message.unwrap_or_else(|| {
            format!("Request failed with code {}", envelope.code)
        })))
    }
}
