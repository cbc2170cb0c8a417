//! Configuration validation module
//!
//! This module provides additional validation logic for configuration
//! beyond the basic validator crate validation.

use crate::config::app_config::{ApiConfig, SessionConfig};
use crate::config::AppConfig;
use crate::shared::error::AppError;

/// Configuration validator for cross-field checks
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the complete configuration
    pub fn validate_config(config: &AppConfig) -> crate::Result<()> {
        Self::validate_api_config(&config.api)?;
        Self::validate_session_config(&config.session)?;

        Ok(())
    }

    /// Validate the checkout API endpoint
    fn validate_api_config(api: &ApiConfig) -> crate::Result<()> {
        let url = api.base_url.as_str();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::Validation(
                "API base URL must start with http:// or https://".to_string()
            ));
        }

        if url.contains("localhost") || url.contains("127.0.0.1") {
            Ok(())
        } else if !url.starts_with("https://") {
            Err(AppError::Validation(
                "Production API base URL must use HTTPS".to_string()
            ))
        } else {
            Ok(())
        }
    }

    /// Validate session timing relationships
    fn validate_session_config(session: &SessionConfig) -> crate::Result<()> {
        if session.poll_interval_seconds >= session.poll_budget_seconds() {
            return Err(AppError::Validation(
                "Poll interval must be shorter than the polling budget".to_string()
            ));
        }

        if session.load_timeout_seconds > session.countdown_seconds {
            tracing::warn!(
                load_timeout = session.load_timeout_seconds,
                countdown = session.countdown_seconds,
                "Order load timeout exceeds the countdown; a slow load can outlive the session"
            );
        }

        Ok(())
    }
}
