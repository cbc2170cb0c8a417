//! Monitoring adapter for session metrics
//!
//! This adapter handles Prometheus metrics for session orchestration.

use crate::shared::error::AppResult;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Session orchestration metrics backed by a private Prometheus registry
#[derive(Clone)]
pub struct SessionMetrics {
    registry: Registry,
    pub order_loads: IntCounter,
    pub provision_requests: IntCounter,
    pub poll_requests: IntCounter,
    pub screen_transitions: IntCounter,
    pub active_clocks: IntGauge,
    pub active_pollers: IntGauge,
}

impl SessionMetrics {
    /// Create and register all session metrics
    pub fn new() -> AppResult<Self> {
        let registry = Registry::new();

        let order_loads = IntCounter::new("checkout_order_loads_total", "Total order snapshot loads")?;
        let provision_requests = IntCounter::new(
            "checkout_provision_requests_total",
            "Total wallet artifact provisioning requests",
        )?;
        let poll_requests = IntCounter::new("checkout_poll_requests_total", "Total payment status queries")?;
        let screen_transitions = IntCounter::new(
            "checkout_screen_transitions_total",
            "Total screen state transitions",
        )?;
        let active_clocks = IntGauge::new("checkout_active_clocks", "Live countdown clocks")?;
        let active_pollers = IntGauge::new("checkout_active_pollers", "Live status pollers")?;

        registry.register(Box::new(order_loads.clone()))?;
        registry.register(Box::new(provision_requests.clone()))?;
        registry.register(Box::new(poll_requests.clone()))?;
        registry.register(Box::new(screen_transitions.clone()))?;
        registry.register(Box::new(active_clocks.clone()))?;
        registry.register(Box::new(active_pollers.clone()))?;

        Ok(Self {
            registry,
            order_loads,
            provision_requests,
            poll_requests,
            screen_transitions,
            active_clocks,
            active_pollers,
        })
    }

    /// Get Prometheus metrics in text format
    pub fn render(&self) -> AppResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::shared::error::AppError::Internal(format!("metrics encoding: {}", e)))
    }
}
