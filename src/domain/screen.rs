//! Screen state derivation
//!
//! The screen is never patched incrementally. Every relevant event rebuilds a
//! [`DerivationInput`] from canonical fields and runs [`derive_screen`].

use serde::{Deserialize, Serialize};

use super::order::{OrderSnapshot, PaymentType};

/// What the guest was successful at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuccessKind {
    Payment,
    Guarantee,
}

/// The single source of truth for what the guest sees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "state", content = "kind")]
pub enum SessionScreenState {
    Loading,
    InvalidSession,
    AwaitingInput,
    Expired,
    Succeeded(SuccessKind),
}

impl SessionScreenState {
    /// No timer-driven transition leaves these states
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionScreenState::InvalidSession | SessionScreenState::Succeeded(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionScreenState::Loading => "loading",
            SessionScreenState::InvalidSession => "invalid_session",
            SessionScreenState::AwaitingInput => "awaiting_input",
            SessionScreenState::Expired => "expired",
            SessionScreenState::Succeeded(SuccessKind::Payment) => "succeeded_payment",
            SessionScreenState::Succeeded(SuccessKind::Guarantee) => "succeeded_guarantee",
        }
    }
}

impl std::fmt::Display for SessionScreenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical inputs to the derivation
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivationInput<'a> {
    pub snapshot: Option<&'a OrderSnapshot>,
    /// The very first load failed
    pub invalid_session: bool,
    pub manual_override: Option<SuccessKind>,
    /// Countdown reached zero
    pub countdown_expired: bool,
    /// A reload failed after the session was established
    pub degraded: bool,
}

/// Success implied by the order snapshot alone
pub fn server_success(order: &OrderSnapshot) -> Option<SuccessKind> {
    match order.payment_type {
        PaymentType::All if order.is_paid() => Some(SuccessKind::Payment),
        PaymentType::All if order.is_guaranteed => Some(SuccessKind::Guarantee),
        PaymentType::Credit if order.is_guaranteed => Some(SuccessKind::Guarantee),
        PaymentType::Pay if order.is_paid() => Some(SuccessKind::Payment),
        _ => None,
    }
}

/// Priority-ordered screen derivation.
///
/// 1. manual override, 2-4. server-reported success by payment type,
/// 5. expiry (countdown or degraded session), 6. awaiting input.
pub fn derive_screen(input: &DerivationInput<'_>) -> SessionScreenState {
    let Some(order) = input.snapshot else {
        return if input.invalid_session {
            SessionScreenState::InvalidSession
        } else {
            SessionScreenState::Loading
        };
    };

    if let Some(kind) = input.manual_override {
        return SessionScreenState::Succeeded(kind);
    }

    if let Some(kind) = server_success(order) {
        return SessionScreenState::Succeeded(kind);
    }

    if input.countdown_expired || input.degraded {
        return SessionScreenState::Expired;
    }

    SessionScreenState::AwaitingInput
}
