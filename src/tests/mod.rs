//! Test suite for the checkout session
//!
//! - Unit tests for session plumbing that needs no timers
//! - Integration tests driving full sessions on paused tokio time
//! - Mock checkout API and fixtures shared by both

pub mod common;
pub mod unit;

/// Test configuration and utilities
pub mod config {
    use crate::config::{AppConfig, SessionConfig};
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Initialize test environment
    pub fn init() {
        INIT.call_once(|| {
            // Initialize tracing for tests
            let _ = tracing_subscriber::fmt()
                .with_env_filter("debug")
                .with_test_writer()
                .try_init();
        });
    }

    /// Create test configuration
    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.api.base_url = "http://127.0.0.1:9".to_string();
        config
    }

    /// Session timings short enough to run a whole countdown in a test
    pub fn short_session() -> SessionConfig {
        SessionConfig {
            countdown_seconds: 30,
            poll_interval_seconds: 3,
            poll_grace_seconds: 10,
            load_timeout_seconds: 5,
            placeholder_seconds: 300,
            confirm_attempts: 3,
        }
    }
}

/// Test result types
pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Test utilities and helpers
pub mod utils {
    use crate::application::{CheckoutSession, SessionView};
    use std::time::Duration;

    /// Wait until the session view satisfies `predicate`, panicking after `limit`
    /// of (virtual) time
    pub async fn wait_for<F>(session: &CheckoutSession, limit: Duration, predicate: F) -> SessionView
    where
        F: FnMut(&SessionView) -> bool,
    {
        match tokio::time::timeout(limit, session.wait_for(predicate)).await {
            Ok(Ok(view)) => view,
            Ok(Err(e)) => panic!("session ended while waiting: {}", e),
            Err(_) => panic!("condition not reached within {:?}; last view: {:?}", limit, session.view()),
        }
    }

    /// Let spawned work settle without advancing past `duration`
    pub async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
