//! Infrastructure adapters module
//!
//! This module contains adapters for external services and infrastructure concerns.

pub mod checkout_api;
pub mod monitoring;
pub mod time_source;

pub use checkout_api::{ApiEnvelope, CheckoutApi, CheckoutApiRef, HttpCheckoutApi, ProvisionedArtifact};
pub use monitoring::SessionMetrics;
pub use time_source::{SystemTimeSource, TimeSource, TimeSourceRef, TokioTimeSource};
