//! Domain layer - Core business logic and domain models
//!
//! This module contains the checkout session's domain models and the pure
//! rules that are independent of timers, HTTP and the runtime.

pub mod artifact;
pub mod card;
pub mod countdown;
pub mod order;
pub mod poll;
pub mod screen;

pub use artifact::{ArtifactPayload, PaymentArtifact, PaymentChannel};
pub use card::GuaranteeCard;
pub use countdown::{remaining_seconds, CountdownState};
pub use order::{available_methods, OrderPaymentState, OrderSnapshot, PaymentMethod, PaymentType, StayDetails};
pub use poll::{ArtifactStatus, PollEvent, PollState};
pub use screen::{derive_screen, server_success, DerivationInput, SessionScreenState, SuccessKind};
