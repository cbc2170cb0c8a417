//! Unit tests for session plumbing
//!
//! These drive the reconciler one event at a time, without waiting on timers.

use crate::{
    application::{
        services::reconciler::{SessionEvent, SessionReconciler},
        CheckoutSession, LoadPurpose, SessionCommand, SessionDeps, SessionNotice, SessionView,
    },
    config::SessionConfig,
    domain::{
        ArtifactPayload, PaymentArtifact, PaymentChannel, PaymentMethod, PaymentType, PollEvent, SessionScreenState,
    },
    infrastructure::adapters::{CheckoutApiRef, SessionMetrics, TokioTimeSource},
    shared::error::{AppError, SessionFailure},
    tests::{
        common::{fixtures, MockCheckoutApi},
        config::test_config,
    },
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

struct Harness {
    reconciler: SessionReconciler,
    view: watch::Receiver<SessionView>,
    _inbox: mpsc::UnboundedReceiver<SessionEvent>,
}

fn harness() -> Harness {
    let api: CheckoutApiRef = Arc::new(MockCheckoutApi::new(fixtures::order(
        PaymentType::All,
        Some(fixtures::anchor()),
    )));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = watch::channel(SessionView::initial("ses_test".to_string(), 300));
    let deps = SessionDeps {
        config: SessionConfig::default(),
        api,
        time: Arc::new(TokioTimeSource::new(fixtures::anchor())),
        metrics: SessionMetrics::new().unwrap(),
    };

    Harness {
        reconciler: SessionReconciler::new(
            "ses_test".to_string(),
            "zh-CN".to_string(),
            "tok-123".to_string(),
            deps,
            events_tx,
            view_tx,
        ),
        view: view_rx,
        _inbox: events_rx,
    }
}

fn loaded(seq: u64, purpose: LoadPurpose, payment_type: PaymentType) -> SessionEvent {
    SessionEvent::OrderLoaded {
        seq,
        purpose,
        result: Ok(fixtures::order(payment_type, Some(fixtures::anchor()))),
    }
}

#[test]
fn test_load_purpose_silence() {
    assert!(!LoadPurpose::Initial.is_silent());
    assert!(!LoadPurpose::Reload.is_silent());
    assert!(LoadPurpose::Refresh.is_silent());
    assert!(LoadPurpose::Confirm { attempt: 2 }.is_silent());
}

#[test]
fn test_initial_view_shows_placeholder() {
    let view = SessionView::initial("ses_1".to_string(), 900);
    assert_eq!(view.screen, SessionScreenState::Loading);
    assert_eq!(view.remaining_seconds, 900);
    assert!(view.loading);
    assert!(view.methods.is_empty());
}

#[test]
fn test_default_test_config_is_valid() {
    let config = test_config();
    assert!(config.validate_config().is_ok());
    assert!(crate::config::ConfigValidator::validate_config(&config).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_load_results_are_dropped() {
    let mut h = harness();

    assert!(h.reconciler.handle(loaded(2, LoadPurpose::Reload, PaymentType::Credit)));
    assert_eq!(h.view.borrow().screen, SessionScreenState::AwaitingInput);

    h.reconciler.handle(SessionEvent::OrderLoaded {
        seq: 1,
        purpose: LoadPurpose::Initial,
        result: Err(SessionFailure::InvalidLink),
    });
    let view = h.view.borrow().clone();
    assert_eq!(view.screen, SessionScreenState::AwaitingInput);
    assert!(view.notice.is_none());
    assert_eq!(view.methods, vec![PaymentMethod::CreditCard]);
}

#[tokio::test(start_paused = true)]
async fn test_first_load_failure_is_invalid_session() {
    let mut h = harness();

    h.reconciler.handle(SessionEvent::OrderLoaded {
        seq: 1,
        purpose: LoadPurpose::Initial,
        result: Err(SessionFailure::ServerError("HTTP 500".to_string())),
    });

    let view = h.view.borrow().clone();
    assert_eq!(view.screen, SessionScreenState::InvalidSession);
    assert!(matches!(view.notice, Some(SessionNotice::ServerUnavailable(_))));
}

#[tokio::test(start_paused = true)]
async fn test_stale_provisioning_result_is_dropped() {
    let mut h = harness();
    h.reconciler.handle(loaded(1, LoadPurpose::Initial, PaymentType::All));
    assert!(h.view.borrow().provisioning);

    h.reconciler.handle(SessionEvent::ArtifactProvisioned {
        seq: 999,
        result: Ok(Some(PaymentArtifact {
            artifact_id: "art-stale".to_string(),
            channel: PaymentChannel::WeChat,
            payload: ArtifactPayload::RedirectLink("weixin://stale".to_string()),
            issued_at: fixtures::anchor(),
        })),
    });

    let view = h.view.borrow().clone();
    assert!(view.artifact.is_none());
    assert!(!view.timers.poller_active);
}

#[tokio::test(start_paused = true)]
async fn test_events_from_cancelled_timers_are_ignored() {
    let mut h = harness();
    h.reconciler.handle(loaded(1, LoadPurpose::Initial, PaymentType::Credit));

    h.reconciler.handle(SessionEvent::Poll {
        generation: 0,
        event: PollEvent::TimedOut,
    });
    h.reconciler.handle(SessionEvent::Clock {
        generation: 0,
        event: crate::application::ClockEvent::Expired,
    });

    let view = h.view.borrow().clone();
    assert!(!view.needs_refresh);
    assert_eq!(view.screen, SessionScreenState::AwaitingInput);
}

#[tokio::test(start_paused = true)]
async fn test_unoffered_method_is_rejected() {
    let mut h = harness();
    h.reconciler.handle(loaded(1, LoadPurpose::Initial, PaymentType::Credit));

    h.reconciler.handle(SessionEvent::Command(SessionCommand::SelectMethod(
        PaymentMethod::Wallet(PaymentChannel::Alipay),
    )));

    assert_eq!(h.view.borrow().selected_method, Some(PaymentMethod::CreditCard));
}

#[tokio::test(start_paused = true)]
async fn test_close_command_ends_the_loop() {
    let mut h = harness();
    assert!(!h.reconciler.handle(SessionEvent::Command(SessionCommand::Close)));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_handle_closes_the_session() {
    let api: CheckoutApiRef = Arc::new(MockCheckoutApi::failing(AppError::InvalidLink));
    let session = CheckoutSession::open(
        "en",
        "tok",
        SessionConfig::default(),
        api,
        Arc::new(TokioTimeSource::starting_now()),
        SessionMetrics::new().unwrap(),
    );
    let mut views = session.subscribe();

    drop(session);
    while views.changed().await.is_ok() {}
    assert!(views.has_changed().is_err());
}
