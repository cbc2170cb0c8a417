//! Error handling module
//!
//! This module provides centralized error handling for the application and the
//! failure taxonomy the session reconciler consumes.

use thiserror::Error;

/// Application error types
#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON serialization error: {0}")]
    Json(String),

    #[error("Payment link not found")]
    InvalidLink,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Payment artifact could not be issued: {0}")]
    Provision(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures as the session reconciler sees them.
///
/// Timer and network failures are caught by the component that owns them and
/// translated into one of these values before they reach the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    /// Terminal: the link does not resolve to an order.
    InvalidLink,
    /// Transient: the server could not be reached or answered garbage.
    ServerError(String),
    /// The wallet artifact could not be issued; retryable.
    ProvisionError(String),
    /// Polling budget exhausted. Not an error for the guest.
    PollTimeout,
    /// A status query failed; polling stopped.
    PollTransportError(String),
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionFailure::InvalidLink => write!(f, "invalid_link"),
            SessionFailure::ServerError(msg) => write!(f, "server_error: {}", msg),
            SessionFailure::ProvisionError(msg) => write!(f, "provision_error: {}", msg),
            SessionFailure::PollTimeout => write!(f, "poll_timeout"),
            SessionFailure::PollTransportError(msg) => write!(f, "poll_transport_error: {}", msg),
        }
    }
}

impl AppError {
    /// Classify an order-load error into the reconciler taxonomy
    pub fn into_load_failure(self) -> SessionFailure {
        match self {
            AppError::InvalidLink => SessionFailure::InvalidLink,
            other => SessionFailure::ServerError(other.to_string()),
        }
    }

    /// Classify a provisioning error into the reconciler taxonomy
    pub fn into_provision_failure(self) -> SessionFailure {
        match self {
            AppError::Provision(msg) => SessionFailure::ProvisionError(msg),
            other => SessionFailure::ProvisionError(other.to_string()),
        }
    }

    /// Whether retrying the same idempotent request may help
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ServerError(_) | AppError::Transport(_) | AppError::Http(_))
    }
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            AppError::Transport(err.to_string())
        } else if err.is_decode() {
            AppError::Json(err.to_string())
        } else {
            AppError::Http(err.to_string())
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<prometheus::Error> for AppError {
    fn from(err: prometheus::Error) -> Self {
        AppError::Internal(format!("metrics: {}", err))
    }
}
