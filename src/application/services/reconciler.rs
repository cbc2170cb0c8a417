//! Session Reconciler
//!
//! The reconciler is the only owner of session state. Loads, provisioning
//! requests, clock ticks and poll results arrive as [`SessionEvent`]s on one
//! channel and are applied in order. After every event the screen is derived
//! afresh from canonical fields and published on a watch channel.
//!
//! Every asynchronous completion carries the sequence or generation number it
//! was started under; completions from cancelled or superseded work are
//! dropped on arrival.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::countdown_clock::{ClockEvent, CountdownClock};
use super::order_loader::OrderSessionLoader;
use super::qr_provisioner::QrProvisioner;
use super::status_poller::StatusPoller;
use crate::config::SessionConfig;
use crate::domain::{
    derive_screen, CountdownState, DerivationInput, GuaranteeCard, OrderSnapshot,
    PaymentArtifact, PaymentChannel, PaymentMethod, PaymentType, PollEvent, PollState, SessionScreenState,
    SuccessKind,
};
use crate::infrastructure::adapters::{CheckoutApiRef, SessionMetrics, TimeSourceRef};
use crate::shared::error::{AppError, AppResult, SessionFailure};
use crate::shared::logging::LoggingUtils;

/// Guest-visible message accompanying the screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "notice", content = "detail")]
pub enum SessionNotice {
    /// Terminal: the link does not resolve
    LinkNotFound,
    /// Retry by reloading the session
    ServerUnavailable(String),
    /// Retry by refreshing the artifact
    ProvisionFailed(String),
    /// The artifact can no longer be paid; refresh it
    ArtifactStale,
    /// The card was not accepted
    GuaranteeRejected(String),
}

/// Liveness of the timer-driven components
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimerStatus {
    pub clock_active: bool,
    pub poller_active: bool,
    pub polled_artifact: Option<String>,
}

/// Everything the presentation layer renders
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session_id: String,
    pub screen: SessionScreenState,
    pub order: Option<OrderSnapshot>,
    pub methods: Vec<PaymentMethod>,
    pub selected_method: Option<PaymentMethod>,
    pub artifact: Option<PaymentArtifact>,
    pub remaining_seconds: u64,
    pub needs_refresh: bool,
    pub loading: bool,
    pub provisioning: bool,
    pub notice: Option<SessionNotice>,
    pub timers: TimerStatus,
}

impl SessionView {
    pub(crate) fn initial(session_id: String, placeholder_seconds: u64) -> Self {
        Self {
            session_id,
            screen: SessionScreenState::Loading,
            order: None,
            methods: Vec::new(),
            selected_method: None,
            artifact: None,
            remaining_seconds: placeholder_seconds,
            needs_refresh: false,
            loading: true,
            provisioning: false,
            notice: None,
            timers: TimerStatus::default(),
        }
    }
}

/// Commands issued by the client surface
#[derive(Debug)]
pub enum SessionCommand {
    SelectMethod(PaymentMethod),
    RefreshArtifact,
    ConfirmManualSuccess(SuccessKind),
    SubmitGuaranteeCard {
        card: GuaranteeCard,
        reply: oneshot::Sender<AppResult<()>>,
    },
    Reload,
    Close,
}

/// Why an order load was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPurpose {
    /// First load of the session
    Initial,
    /// Guest asked to reload
    Reload,
    /// Background refresh after an override or card submission
    Refresh,
    /// Confirming a wallet success reported by the poller
    Confirm { attempt: u32 },
}

impl LoadPurpose {
    pub fn is_silent(&self) -> bool {
        matches!(self, LoadPurpose::Refresh | LoadPurpose::Confirm { .. })
    }
}

/// Everything the reconciler reacts to
#[derive(Debug)]
pub enum SessionEvent {
    Command(SessionCommand),
    OrderLoaded {
        seq: u64,
        purpose: LoadPurpose,
        result: Result<OrderSnapshot, SessionFailure>,
    },
    ArtifactProvisioned {
        seq: u64,
        result: Result<Option<PaymentArtifact>, SessionFailure>,
    },
    Clock {
        generation: u64,
        event: ClockEvent,
    },
    Poll {
        generation: u64,
        event: PollEvent,
    },
    GuaranteeSubmitted {
        result: AppResult<()>,
        reply: oneshot::Sender<AppResult<()>>,
    },
    ConfirmRetry {
        attempt: u32,
    },
}

/// Collaborators a reconciler needs
#[derive(Clone)]
pub struct SessionDeps {
    pub config: SessionConfig,
    pub api: CheckoutApiRef,
    pub time: TimeSourceRef,
    pub metrics: SessionMetrics,
}

pub struct SessionReconciler {
    session_id: String,
    language: String,
    token: String,
    config: SessionConfig,
    api: CheckoutApiRef,
    time: TimeSourceRef,
    metrics: SessionMetrics,
    loader: Arc<OrderSessionLoader>,
    provisioner: Arc<QrProvisioner>,
    clock: CountdownClock,
    poller: StatusPoller,
    events: mpsc::UnboundedSender<SessionEvent>,
    view: watch::Sender<SessionView>,

    snapshot: Option<OrderSnapshot>,
    invalid_session: bool,
    degraded: bool,
    manual_override: Option<SuccessKind>,
    countdown_expired: bool,
    selected_method: Option<PaymentMethod>,
    artifact: Option<PaymentArtifact>,
    needs_refresh: bool,
    remaining_seconds: u64,
    notice: Option<SessionNotice>,
    screen: SessionScreenState,

    load_seq: u64,
    applied_load_seq: u64,
    visible_loads: u32,
    provision_seq: u64,
    provision_task: Option<JoinHandle<()>>,
    clock_generation: u64,
    poll_generation: u64,
}

impl SessionReconciler {
    pub fn new(
        session_id: String,
        language: String,
        token: String,
        deps: SessionDeps,
        events: mpsc::UnboundedSender<SessionEvent>,
        view: watch::Sender<SessionView>,
    ) -> Self {
        let SessionDeps { config, api, time, metrics } = deps;
        let loader = OrderSessionLoader::new(api.clone(), config.load_timeout(), metrics.clone());
        let provisioner = QrProvisioner::new(api.clone(), time.clone(), config.load_timeout(), metrics.clone());
        let clock = CountdownClock::new(time.clone());
        let poller = StatusPoller::new(api.clone(), time.clone(), config.poll_interval(), metrics.clone());
        let remaining_seconds = config.placeholder_seconds;

        Self {
            session_id,
            language,
            token,
            config,
            api,
            time,
            metrics,
            loader: Arc::new(loader),
            provisioner: Arc::new(provisioner),
            clock,
            poller,
            events,
            view,
            snapshot: None,
            invalid_session: false,
            degraded: false,
            manual_override: None,
            countdown_expired: false,
            selected_method: None,
            artifact: None,
            needs_refresh: false,
            remaining_seconds,
            notice: None,
            screen: SessionScreenState::Loading,
            load_seq: 0,
            applied_load_seq: 0,
            visible_loads: 0,
            provision_seq: 0,
            provision_task: None,
            clock_generation: 0,
            poll_generation: 0,
        }
    }

    /// Drive the session until it is closed
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<SessionEvent>) {
        info!(session_id = %self.session_id, language = %self.language, "Checkout session opened");
        self.request_load(LoadPurpose::Initial);
        self.publish();

        while let Some(event) = inbox.recv().await {
            if !self.handle(event) {
                break;
            }
        }

        self.teardown();
        self.publish();
        info!(session_id = %self.session_id, screen = %self.screen, "Checkout session closed");
    }

    /// Apply one event. Returns `false` once the session is closed.
    pub fn handle(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Command(SessionCommand::Close) => return false,
            SessionEvent::Command(command) => self.on_command(command),
            SessionEvent::OrderLoaded { seq, purpose, result } => self.on_order_loaded(seq, purpose, result),
            SessionEvent::ArtifactProvisioned { seq, result } => self.on_artifact_provisioned(seq, result),
            SessionEvent::Clock { generation, event } => self.on_clock(generation, event),
            SessionEvent::Poll { generation, event } => self.on_poll(generation, event),
            SessionEvent::GuaranteeSubmitted { result, reply } => self.on_guarantee_submitted(result, reply),
            SessionEvent::ConfirmRetry { attempt } => {
                if !self.screen.is_terminal() {
                    self.request_load(LoadPurpose::Confirm { attempt });
                }
            }
        }

        self.rederive();
        true
    }

    fn accepts_input(&self) -> bool {
        self.snapshot.is_some() && !self.screen.is_terminal()
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SelectMethod(method) => {
                if self.accepts_input() {
                    self.select_method(method);
                } else {
                    debug!(session_id = %self.session_id, method = %method, "Ignoring method selection");
                }
            }
            SessionCommand::RefreshArtifact => {
                if self.accepts_input() {
                    self.refresh_artifact();
                }
            }
            SessionCommand::ConfirmManualSuccess(kind) => {
                info!(session_id = %self.session_id, kind = ?kind, "Manual success confirmed");
                self.manual_override = Some(kind);
                if self.snapshot.is_some() {
                    self.request_load(LoadPurpose::Refresh);
                }
            }
            SessionCommand::SubmitGuaranteeCard { card, reply } => self.submit_guarantee_card(card, reply),
            SessionCommand::Reload => {
                if self.accepts_input() {
                    self.request_load(LoadPurpose::Reload);
                }
            }
            SessionCommand::Close => {}
        }
    }

    // ---- order loading -------------------------------------------------

    fn request_load(&mut self, purpose: LoadPurpose) {
        self.load_seq += 1;
        let seq = self.load_seq;
        if !purpose.is_silent() {
            self.visible_loads += 1;
        }

        let loader = self.loader.clone();
        let events = self.events.clone();
        let language = self.language.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            let result = loader.load(&language, &token, purpose.is_silent()).await;
            let _ = events.send(SessionEvent::OrderLoaded { seq, purpose, result });
        });
    }

    fn on_order_loaded(&mut self, seq: u64, purpose: LoadPurpose, result: Result<OrderSnapshot, SessionFailure>) {
        if !purpose.is_silent() {
            self.visible_loads = self.visible_loads.saturating_sub(1);
        }
        if seq <= self.applied_load_seq {
            debug!(session_id = %self.session_id, seq, "Dropping superseded order load");
            return;
        }
        self.applied_load_seq = seq;

        match result {
            Ok(order) => self.apply_snapshot(order, purpose),
            Err(failure) => {
                LoggingUtils::log_failure(&self.session_id, &failure);
                if self.snapshot.is_none() {
                    self.invalid_session = true;
                    self.notice = Some(match failure {
                        SessionFailure::InvalidLink => SessionNotice::LinkNotFound,
                        other => SessionNotice::ServerUnavailable(other.to_string()),
                    });
                } else {
                    self.degraded = true;
                    self.notice = Some(SessionNotice::ServerUnavailable(failure.to_string()));
                }
            }
        }
    }

    fn apply_snapshot(&mut self, order: OrderSnapshot, purpose: LoadPurpose) {
        let established = self.snapshot.is_some();
        let created_at_changed = self.snapshot.as_ref().map(|o| o.created_at) != Some(order.created_at);

        if self.degraded {
            info!(session_id = %self.session_id, "Order reachable again");
            self.degraded = false;
            if matches!(self.notice, Some(SessionNotice::ServerUnavailable(_))) {
                self.notice = None;
            }
        }
        self.snapshot = Some(order);

        // Success already on record: nothing to select
        if self.derive().is_terminal() {
            return;
        }
        if !established {
            let default = self.default_method();
            self.select_method(default);
            return;
        }

        let methods = self.available_methods();
        match self.selected_method {
            Some(method) if methods.contains(&method) => {
                if method == PaymentMethod::CreditCard && created_at_changed {
                    self.start_clock(self.order_created_at());
                }
            }
            _ => {
                let default = self.default_method();
                info!(session_id = %self.session_id, method = %default, "Selected method no longer offered");
                self.select_method(default);
            }
        }

        // Still unconfirmed: the order has not caught up with the wallet yet
        if let LoadPurpose::Confirm { attempt } = purpose {
            if attempt < self.config.confirm_attempts {
                let events = self.events.clone();
                let delay = self.config.poll_interval();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(SessionEvent::ConfirmRetry { attempt: attempt + 1 });
                });
            } else {
                warn!(session_id = %self.session_id, attempt, "Wallet success not reflected by order");
                self.needs_refresh = true;
            }
        }
    }

    // ---- method selection and provisioning ------------------------------

    fn available_methods(&self) -> Vec<PaymentMethod> {
        self.snapshot
            .as_ref()
            .map(OrderSnapshot::available_methods)
            .unwrap_or_default()
    }

    fn default_method(&self) -> PaymentMethod {
        self.snapshot
            .as_ref()
            .map(OrderSnapshot::default_method)
            .unwrap_or(PaymentMethod::CreditCard)
    }

    fn order_created_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_ref().and_then(|order| order.created_at)
    }

    /// Reference instant for an artifact's countdown and poll budget.
    ///
    /// PAY orders restart from the artifact's issuance. ALL orders stay bound to
    /// the order's own deadline, so a fresh artifact never extends it.
    fn artifact_reference(&self, artifact: &PaymentArtifact) -> DateTime<Utc> {
        let order_bound = self
            .snapshot
            .as_ref()
            .filter(|order| order.payment_type == PaymentType::All)
            .and_then(|order| order.created_at);

        match order_bound {
            Some(created_at) => created_at.min(artifact.issued_at),
            None => artifact.issued_at,
        }
    }

    fn select_method(&mut self, method: PaymentMethod) {
        if !self.available_methods().contains(&method) {
            warn!(session_id = %self.session_id, method = %method, "Method not offered for this order");
            return;
        }
        if self.selected_method == Some(method) && (self.artifact.is_some() || self.provision_task.is_some()) {
            return;
        }

        info!(session_id = %self.session_id, method = %method, "Payment method selected");
        self.stop_timers();
        self.abort_provisioning();
        self.artifact = None;
        self.needs_refresh = false;
        if matches!(
            self.notice,
            Some(SessionNotice::ProvisionFailed(_)) | Some(SessionNotice::ArtifactStale)
        ) {
            self.notice = None;
        }
        self.selected_method = Some(method);

        // No artifact is live yet, so the order creation time anchors the clock
        self.start_clock(self.order_created_at());
        if let PaymentMethod::Wallet(channel) = method {
            self.start_provisioning(channel);
        }
    }

    fn refresh_artifact(&mut self) {
        let Some(PaymentMethod::Wallet(channel)) = self.selected_method else {
            debug!(session_id = %self.session_id, "Refresh requested without a wallet method");
            return;
        };

        info!(session_id = %self.session_id, channel = %channel, "Refreshing payment artifact");
        self.stop_poller();
        self.abort_provisioning();
        self.artifact = None;
        self.start_provisioning(channel);
    }

    fn start_provisioning(&mut self, channel: PaymentChannel) {
        let Some(order) = self.snapshot.clone() else {
            return;
        };

        self.provision_seq += 1;
        let seq = self.provision_seq;
        let provisioner = self.provisioner.clone();
        let events = self.events.clone();
        let token = self.token.clone();
        self.provision_task = Some(tokio::spawn(async move {
            let result = provisioner.provision(&order, channel, &token).await;
            let _ = events.send(SessionEvent::ArtifactProvisioned { seq, result });
        }));
    }

    fn abort_provisioning(&mut self) {
        if let Some(task) = self.provision_task.take() {
            task.abort();
        }
        // Results already queued from the aborted request are dropped by seq
        self.provision_seq += 1;
    }

    fn on_artifact_provisioned(&mut self, seq: u64, result: Result<Option<PaymentArtifact>, SessionFailure>) {
        if seq != self.provision_seq {
            debug!(session_id = %self.session_id, seq, "Dropping superseded provisioning result");
            return;
        }
        self.provision_task = None;

        match result {
            Ok(Some(artifact)) => {
                self.stop_poller();
                self.needs_refresh = false;
                self.notice = None;
                let reference = self.artifact_reference(&artifact);
                self.start_clock(Some(reference));
                self.start_poller(&artifact, reference);
                self.artifact = Some(artifact);
            }
            Ok(None) => {
                debug!(session_id = %self.session_id, "Provisioning skipped for a paid order");
            }
            Err(failure) => {
                LoggingUtils::log_failure(&self.session_id, &failure);
                self.needs_refresh = true;
                self.notice = Some(SessionNotice::ProvisionFailed(match failure {
                    SessionFailure::ProvisionError(msg) => msg,
                    other => other.to_string(),
                }));
            }
        }
    }

    // ---- timers ---------------------------------------------------------

    fn start_clock(&mut self, reference: Option<DateTime<Utc>>) {
        self.clock_generation += 1;
        let generation = self.clock_generation;
        let state = CountdownState::new(reference, self.config.countdown_seconds, self.config.placeholder_seconds);

        self.countdown_expired = false;
        self.remaining_seconds = state.remaining_seconds(self.time.now());

        let events = self.events.clone();
        self.clock.start(state, move |event| {
            let _ = events.send(SessionEvent::Clock { generation, event });
        });
        LoggingUtils::log_timer(&self.session_id, "countdown", "start");
    }

    fn stop_clock(&mut self) {
        self.clock.cancel();
        self.clock_generation += 1;
    }

    fn start_poller(&mut self, artifact: &PaymentArtifact, reference: DateTime<Utc>) {
        self.poll_generation += 1;
        let generation = self.poll_generation;
        let state = PollState::new(
            artifact.artifact_id.clone(),
            reference,
            self.config.poll_budget_seconds(),
        );

        let events = self.events.clone();
        self.poller.start(state, move |event| {
            let _ = events.send(SessionEvent::Poll { generation, event });
        });
        LoggingUtils::log_timer(&self.session_id, "poller", "start");
    }

    fn stop_poller(&mut self) {
        if self.poller.is_active() {
            LoggingUtils::log_timer(&self.session_id, "poller", "cancel");
        }
        self.poller.cancel();
        self.poll_generation += 1;
    }

    fn stop_timers(&mut self) {
        self.stop_poller();
        self.stop_clock();
    }

    fn on_clock(&mut self, generation: u64, event: ClockEvent) {
        if generation != self.clock_generation {
            return;
        }

        match event {
            ClockEvent::Tick { remaining_seconds } => self.remaining_seconds = remaining_seconds,
            ClockEvent::Expired => {
                LoggingUtils::log_timer(&self.session_id, "countdown", "expired");
                self.remaining_seconds = 0;
                self.countdown_expired = true;
                // An expired artifact must be replaced even if the poller still runs
                if self.selected_method.is_some_and(|m| m.is_wallet()) {
                    self.needs_refresh = true;
                }
            }
        }
    }

    fn on_poll(&mut self, generation: u64, event: PollEvent) {
        if generation != self.poll_generation {
            debug!(session_id = %self.session_id, "Dropping event from a cancelled poller");
            return;
        }
        if event.is_final() {
            self.poller.cancel();
        }

        match event {
            PollEvent::Progress => {
                if !self.countdown_expired {
                    self.needs_refresh = false;
                }
            }
            PollEvent::Succeeded => {
                info!(session_id = %self.session_id, "Wallet reported payment success, confirming with order");
                self.request_load(LoadPurpose::Confirm { attempt: 1 });
            }
            PollEvent::NeedsRefresh(status) => {
                info!(session_id = %self.session_id, status = ?status, "Artifact can no longer be paid");
                self.needs_refresh = true;
                self.notice = Some(SessionNotice::ArtifactStale);
            }
            PollEvent::TimedOut => {
                LoggingUtils::log_failure(&self.session_id, &SessionFailure::PollTimeout);
                self.needs_refresh = true;
            }
            PollEvent::TransportFailed(msg) => {
                LoggingUtils::log_failure(&self.session_id, &SessionFailure::PollTransportError(msg));
                self.needs_refresh = true;
            }
        }
    }

    // ---- guarantee card -------------------------------------------------

    fn submit_guarantee_card(&mut self, card: GuaranteeCard, reply: oneshot::Sender<AppResult<()>>) {
        let order_id = match &self.snapshot {
            Some(order) if self.accepts_input() && order.available_methods().contains(&PaymentMethod::CreditCard) => {
                order.order_id.clone()
            }
            _ => {
                let _ = reply.send(Err(AppError::Validation(
                    "Session is not accepting a guarantee card".to_string(),
                )));
                return;
            }
        };

        info!(session_id = %self.session_id, order_id = %order_id, card = ?card, "Submitting guarantee card");
        let api = self.api.clone();
        let events = self.events.clone();
        let token = self.token.clone();
        let timeout = self.config.load_timeout();
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, api.submit_guarantee_card(&order_id, &card, &token)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::ServerError("Guarantee submission timed out".to_string())),
            };
            let _ = events.send(SessionEvent::GuaranteeSubmitted { result, reply });
        });
    }

    fn on_guarantee_submitted(&mut self, result: AppResult<()>, reply: oneshot::Sender<AppResult<()>>) {
        match &result {
            Ok(()) => {
                info!(session_id = %self.session_id, "Guarantee card accepted");
                self.manual_override = Some(SuccessKind::Guarantee);
                self.request_load(LoadPurpose::Refresh);
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Guarantee card rejected");
                self.notice = Some(SessionNotice::GuaranteeRejected(e.to_string()));
            }
        }
        let _ = reply.send(result);
    }

    // ---- derivation -----------------------------------------------------

    fn derive(&self) -> SessionScreenState {
        derive_screen(&DerivationInput {
            snapshot: self.snapshot.as_ref(),
            invalid_session: self.invalid_session,
            manual_override: self.manual_override,
            countdown_expired: self.countdown_expired,
            degraded: self.degraded,
        })
    }

    fn rederive(&mut self) {
        let next = self.derive();
        if next != self.screen {
            LoggingUtils::log_transition(&self.session_id, self.screen.as_str(), next.as_str());
            self.metrics.screen_transitions.inc();
            self.screen = next;
        }
        if self.screen.is_terminal() {
            self.teardown();
        }
        self.publish();
    }

    fn teardown(&mut self) {
        if self.clock.is_active() || self.poller.is_active() || self.provision_task.is_some() {
            LoggingUtils::log_timer(&self.session_id, "all", "teardown");
        }
        self.stop_timers();
        self.abort_provisioning();
    }

    fn publish(&self) {
        let timers = TimerStatus {
            clock_active: self.clock.is_active(),
            poller_active: self.poller.is_active(),
            polled_artifact: self.poller.artifact_id().map(str::to_string),
        };
        self.metrics.active_clocks.set(i64::from(timers.clock_active));
        self.metrics.active_pollers.set(i64::from(timers.poller_active));

        let view = SessionView {
            session_id: self.session_id.clone(),
            screen: self.screen,
            order: self.snapshot.clone(),
            methods: self.available_methods(),
            selected_method: self.selected_method,
            artifact: self.artifact.clone(),
            remaining_seconds: self.remaining_seconds,
            needs_refresh: self.needs_refresh,
            loading: self.visible_loads > 0,
            provisioning: self.provision_task.is_some(),
            notice: self.notice.clone(),
            timers,
        };
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}
