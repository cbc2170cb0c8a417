//! Logging utilities module
//!
//! This module provides centralized logging functionality and utilities.

use crate::shared::error::{AppError, SessionFailure};
use tracing::{debug, info, warn};

/// Logging utilities for the application
pub struct LoggingUtils;

impl LoggingUtils {
    /// Initialize logging with the specified configuration
    pub fn initialize(level: &str, format: &str, structured: bool) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level));

        let builder = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(structured)
            .with_line_number(structured)
            .with_ansi(false);

        let result = if format.eq_ignore_ascii_case("json") {
            tracing::subscriber::set_global_default(builder.json().finish())
        } else {
            tracing::subscriber::set_global_default(builder.finish())
        };

        result.map_err(|e| AppError::Internal(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }

    /// Log a screen state transition
    pub fn log_transition(session_id: &str, from: &str, to: &str) {
        info!(
            session_id = %session_id,
            from = %from,
            to = %to,
            "Session screen transition"
        );
    }

    /// Log a timer lifecycle change (start, cancel, expire)
    pub fn log_timer(session_id: &str, timer: &str, action: &str) {
        debug!(
            session_id = %session_id,
            timer = %timer,
            action = %action,
            "Session timer"
        );
    }

    /// Log a failure delivered to the reconciler
    pub fn log_failure(session_id: &str, failure: &SessionFailure) {
        warn!(
            session_id = %session_id,
            failure = %failure,
            "Session failure"
        );
    }

    /// Generate a unique session ID
    pub fn generate_session_id() -> String {
        format!("ses_{}", uuid::Uuid::new_v4().simple())
    }
}
