//! Application configuration structures
//!
//! This module contains the main configuration structures for the application.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Checkout API configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the checkout backend
    #[validate(url)]
    pub base_url: String,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 120))]
    pub timeout_seconds: u64,

    /// Maximum retry attempts for idempotent order reads
    #[validate(range(min = 0, max = 10))]
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_seconds: 10,
            max_retries: 2,
        }
    }
}

/// Session timing configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SessionConfig {
    /// Countdown shown to the guest, in seconds
    #[validate(range(min = 1, max = 86400))]
    pub countdown_seconds: u64,

    /// Seconds between two payment status queries
    #[validate(range(min = 1, max = 60))]
    pub poll_interval_seconds: u64,

    /// Extra polling time granted past the countdown
    #[validate(range(min = 0, max = 3600))]
    pub poll_grace_seconds: u64,

    /// Upper bound on a single order load
    #[validate(range(min = 1, max = 120))]
    pub load_timeout_seconds: u64,

    /// Countdown value shown when the order has no usable creation time
    #[validate(range(min = 1, max = 86400))]
    pub placeholder_seconds: u64,

    /// Silent reloads used to confirm a wallet success against the order
    #[validate(range(min = 1, max = 10))]
    pub confirm_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: 300,
            poll_interval_seconds: 3,
            poll_grace_seconds: 10,
            load_timeout_seconds: 15,
            placeholder_seconds: 300,
            confirm_attempts: 3,
        }
    }
}

impl SessionConfig {
    /// Total polling budget: countdown plus grace
    pub fn poll_budget_seconds(&self) -> u64 {
        self.countdown_seconds + self.poll_grace_seconds
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    #[validate(length(min = 1))]
    pub level: String,

    /// Log format ("text" or "json")
    #[validate(length(min = 1))]
    pub format: String,

    /// Include file and line in log records
    pub structured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            structured: false,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Checkout API configuration
    pub api: ApiConfig,

    /// Session timing configuration
    pub session: SessionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> crate::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("Conf").required(false))
            .add_source(config::Environment::with_prefix("CHECKOUT").separator("__"))
            .build()
            .map_err(|e| crate::shared::error::AppError::Config(format!("Failed to build configuration: {}", e)))?;

        let config: AppConfig = config.try_deserialize()
            .map_err(|e| crate::shared::error::AppError::Config(format!("Failed to deserialize configuration: {}", e)))?;

        config.validate_config()
            .map_err(|e| crate::shared::error::AppError::Validation(format!("Configuration validation failed: {}", e)))?;
        super::ConfigValidator::validate_config(&config)?;

        Ok(config)
    }

    /// Validate every section with its derive rules
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.api.validate()?;
        self.session.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}
