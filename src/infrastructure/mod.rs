//! Infrastructure layer - External concerns and adapters
//!
//! This module contains the checkout API client, time sources and metrics.

pub mod adapters;

pub use adapters::{CheckoutApi, CheckoutApiRef, HttpCheckoutApi, SessionMetrics};
