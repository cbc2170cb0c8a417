//! Common test utilities and mock implementations
//!
//! This module provides the scripted checkout API and order fixtures used
//! across all test modules.

use crate::{
    application::CheckoutSession,
    config::SessionConfig,
    domain::{
        ArtifactStatus, GuaranteeCard, OrderPaymentState, OrderSnapshot, PaymentChannel, PaymentType, StayDetails,
    },
    infrastructure::adapters::{CheckoutApi, CheckoutApiRef, ProvisionedArtifact, SessionMetrics, TokioTimeSource},
    shared::error::{AppError, AppResult},
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Scripted checkout API.
///
/// Each script is a queue whose last entry repeats once the others are used up.
pub struct MockCheckoutApi {
    orders: Mutex<VecDeque<AppResult<OrderSnapshot>>>,
    provisions: Mutex<VecDeque<AppResult<ProvisionedArtifact>>>,
    statuses: Mutex<VecDeque<AppResult<ArtifactStatus>>>,
    guarantee: Mutex<AppResult<()>>,
    provision_delay: Mutex<Duration>,
    order_fetches: Mutex<u32>,
    provision_calls: Mutex<Vec<PaymentChannel>>,
    status_calls: Mutex<HashMap<String, u32>>,
    guarantee_calls: Mutex<u32>,
}

fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl MockCheckoutApi {
    /// Create a mock that serves `order` for every load
    pub fn new(order: OrderSnapshot) -> Self {
        Self {
            orders: Mutex::new(VecDeque::from([Ok(order)])),
            provisions: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::from([Ok(ArtifactStatus::Pending)])),
            guarantee: Mutex::new(Ok(())),
            provision_delay: Mutex::new(Duration::ZERO),
            order_fetches: Mutex::new(0),
            provision_calls: Mutex::new(Vec::new()),
            status_calls: Mutex::new(HashMap::new()),
            guarantee_calls: Mutex::new(0),
        }
    }

    /// Create a mock whose order loads all fail with `error`
    pub fn failing(error: AppError) -> Self {
        let mock = Self::new(fixtures::order(PaymentType::Credit, None));
        *mock.orders.try_lock().expect("fresh mutex") = VecDeque::from([Err(error)]);
        mock
    }

    /// Replace the order script
    pub async fn script_orders(&self, script: Vec<AppResult<OrderSnapshot>>) {
        *self.orders.lock().await = script.into();
    }

    /// Replace the provisioning script. An empty script issues generated artifacts.
    pub async fn script_provisions(&self, script: Vec<AppResult<ProvisionedArtifact>>) {
        *self.provisions.lock().await = script.into();
    }

    /// Replace the payment status script, shared by every artifact
    pub async fn script_statuses(&self, script: Vec<ArtifactStatus>) {
        *self.statuses.lock().await = script.into_iter().map(Ok).collect();
    }

    /// Replace the payment status script with raw results, errors included
    pub async fn script_status_results(&self, script: Vec<AppResult<ArtifactStatus>>) {
        *self.statuses.lock().await = script.into();
    }

    pub async fn set_guarantee_response(&self, response: AppResult<()>) {
        *self.guarantee.lock().await = response;
    }

    pub async fn set_provision_delay(&self, delay: Duration) {
        *self.provision_delay.lock().await = delay;
    }

    pub async fn order_fetches(&self) -> u32 {
        *self.order_fetches.lock().await
    }

    pub async fn provision_calls(&self) -> Vec<PaymentChannel> {
        self.provision_calls.lock().await.clone()
    }

    /// Status queries per artifact id
    pub async fn status_calls(&self) -> HashMap<String, u32> {
        self.status_calls.lock().await.clone()
    }

    pub async fn total_status_calls(&self) -> u32 {
        self.status_calls.lock().await.values().sum()
    }

    pub async fn guarantee_calls(&self) -> u32 {
        *self.guarantee_calls.lock().await
    }
}

#[async_trait]
impl CheckoutApi for MockCheckoutApi {
    async fn fetch_order(&self, _language: &str, _token: &str) -> AppResult<OrderSnapshot> {
        *self.order_fetches.lock().await += 1;
        next_scripted(&mut *self.orders.lock().await)
            .unwrap_or_else(|| Err(AppError::ServerError("no order scripted".to_string())))
    }

    async fn provision_payment(
        &self,
        _order_id: &str,
        channel: PaymentChannel,
        _link_token: &str,
    ) -> AppResult<ProvisionedArtifact> {
        let call = {
            let mut calls = self.provision_calls.lock().await;
            calls.push(channel);
            calls.len()
        };

        let delay = *self.provision_delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match next_scripted(&mut *self.provisions.lock().await) {
            Some(response) => response,
            None => Ok(ProvisionedArtifact {
                artifact_id: format!("art-{}-{}", channel.as_str().to_lowercase(), call),
                payload: format!("weixin://wxpay/bizpayurl?pr={}", call),
                issued_at: None,
            }),
        }
    }

    async fn payment_status(&self, artifact_id: &str) -> AppResult<ArtifactStatus> {
        *self
            .status_calls
            .lock()
            .await
            .entry(artifact_id.to_string())
            .or_insert(0) += 1;
        next_scripted(&mut *self.statuses.lock().await).unwrap_or(Ok(ArtifactStatus::Pending))
    }

    async fn submit_guarantee_card(&self, _order_id: &str, _card: &GuaranteeCard, _link_token: &str) -> AppResult<()> {
        *self.guarantee_calls.lock().await += 1;
        self.guarantee.lock().await.clone()
    }
}

/// Test fixtures
pub mod fixtures {
    use super::*;

    /// Wall-clock instant the paused tokio clock is anchored to
    pub fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    /// An unpaid, unguaranteed order
    pub fn order(payment_type: PaymentType, created_at: Option<DateTime<Utc>>) -> OrderSnapshot {
        OrderSnapshot {
            order_id: "ORD-20240501-0001".to_string(),
            stay: StayDetails {
                hotel_name: "Harbour View".to_string(),
                room_name: "Deluxe King".to_string(),
                check_in: "2024-05-10".to_string(),
                check_out: "2024-05-12".to_string(),
                guest_name: Some("Lin".to_string()),
            },
            amount: "1280.00".to_string(),
            currency: "CNY".to_string(),
            payment_type,
            payment_state: OrderPaymentState::Pending,
            is_guaranteed: false,
            created_at,
        }
    }

    pub fn paid(mut order: OrderSnapshot) -> OrderSnapshot {
        order.payment_state = OrderPaymentState::Success;
        order
    }

    pub fn guaranteed(mut order: OrderSnapshot) -> OrderSnapshot {
        order.is_guaranteed = true;
        order
    }

    pub fn card() -> GuaranteeCard {
        GuaranteeCard {
            holder_name: "LIN WEI".to_string(),
            card_number: "4111111111111111".to_string(),
            expiry_month: 12,
            expiry_year: 2030,
            security_code: "123".to_string(),
        }
    }
}

/// A session wired to a mock API on a paused clock anchored at [`fixtures::anchor`]
pub struct TestSession {
    pub session: CheckoutSession,
    pub api: Arc<MockCheckoutApi>,
    pub metrics: SessionMetrics,
}

impl TestSession {
    pub fn open(api: Arc<MockCheckoutApi>, config: SessionConfig) -> Self {
        super::config::init();
        let metrics = SessionMetrics::new().expect("metrics register");
        let api_ref: CheckoutApiRef = api.clone();
        let session = CheckoutSession::open(
            "zh-CN",
            "tok-123",
            config,
            api_ref,
            Arc::new(TokioTimeSource::new(fixtures::anchor())),
            metrics.clone(),
        );

        Self { session, api, metrics }
    }
}
