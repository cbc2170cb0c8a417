//! Checkout Session - Hosted payment checkout session engine
//!
//! This library drives a guest's checkout session for a hotel order: it loads
//! the order behind a checkout link, runs the payment countdown, provisions
//! wallet payment artifacts, polls their status and reconciles everything into
//! a single screen state.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

#[cfg(test)]
mod tests;

pub use application::{CheckoutSession, SessionView};
pub use config::AppConfig;
pub use domain::{PaymentMethod, SessionScreenState, SuccessKind};
pub use shared::error::{AppError, AppResult, SessionFailure};

/// Application result type
pub type Result<T> = std::result::Result<T, shared::error::AppError>;
