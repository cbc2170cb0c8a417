//! Application layer - Session orchestration
//!
//! This module wires the domain rules to timers and the checkout API and
//! exposes the session handle used by clients.

pub mod services;
pub mod session;

pub use services::*;
pub use session::CheckoutSession;
