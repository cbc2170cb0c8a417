use std::sync::Arc;

use anyhow::Context;
use checkout_session::application::CheckoutSession;
use checkout_session::domain::{PaymentMethod, SessionScreenState};
use checkout_session::infrastructure::adapters::{HttpCheckoutApi, SessionMetrics, SystemTimeSource};
use checkout_session::shared::logging::LoggingUtils;
use checkout_session::AppConfig;
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Language of the checkout link
    #[arg(long)]
    lang: String,

    /// Checkout link token
    #[arg(long)]
    token: String,

    /// Payment method to select once the order is loaded (wechat, alipay, card)
    #[arg(long)]
    method: Option<PaymentMethod>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    if let Err(e) = LoggingUtils::initialize(&config.logging.level, &config.logging.format, config.logging.structured) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting checkout session...");

    match run(cli, config).await {
        Ok(SessionScreenState::InvalidSession) => {
            error!("Checkout link is not valid");
            std::process::exit(2);
        }
        Ok(screen) => info!(screen = %screen, "Checkout session finished"),
        Err(e) => {
            error!("Checkout session failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<SessionScreenState> {
    let api = HttpCheckoutApi::new(config.api.clone()).context("Failed to create checkout API client")?;
    let metrics = SessionMetrics::new().context("Failed to register session metrics")?;

    let session = CheckoutSession::open(
        cli.lang,
        cli.token,
        config.session.clone(),
        Arc::new(api),
        Arc::new(SystemTimeSource),
        metrics.clone(),
    );
    info!(session_id = %session.session_id(), "Session opened");

    let mut views = session.subscribe();
    let mut method_pending = cli.method;

    loop {
        let view = views.borrow_and_update().clone();
        info!(
            screen = %view.screen,
            method = ?view.selected_method,
            remaining_seconds = view.remaining_seconds,
            needs_refresh = view.needs_refresh,
            notice = ?view.notice,
            "Session view"
        );

        if view.screen.is_terminal() {
            break;
        }
        if view.screen == SessionScreenState::AwaitingInput {
            if let Some(method) = method_pending.take() {
                if !view.methods.contains(&method) {
                    warn!(method = %method, "Requested method is not offered for this order");
                } else if view.selected_method != Some(method) {
                    session.select_method(method)?;
                }
            }
        }

        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing session");
                break;
            }
        }
    }

    let screen = session.current_screen_state();
    session.close().await?;

    if let Ok(rendered) = metrics.render() {
        tracing::debug!(metrics = %rendered, "Session metrics");
    }

    Ok(screen)
}
