//! Checkout session handle
//!
//! `CheckoutSession` is the client-facing surface: it spawns the reconciler,
//! forwards commands to it and exposes the published [`SessionView`].

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::application::services::reconciler::{
    SessionCommand, SessionDeps, SessionEvent, SessionReconciler, SessionView,
};
use crate::config::SessionConfig;
use crate::domain::{GuaranteeCard, PaymentMethod, SessionScreenState, SuccessKind};
use crate::infrastructure::adapters::{CheckoutApiRef, SessionMetrics, TimeSourceRef};
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;

pub struct CheckoutSession {
    session_id: String,
    commands: mpsc::UnboundedSender<SessionEvent>,
    view: watch::Receiver<SessionView>,
    task: Option<JoinHandle<()>>,
}

impl CheckoutSession {
    /// Open a session for a checkout link and start the initial load.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        language: impl Into<String>,
        token: impl Into<String>,
        config: SessionConfig,
        api: CheckoutApiRef,
        time: TimeSourceRef,
        metrics: SessionMetrics,
    ) -> Self {
        let session_id = LoggingUtils::generate_session_id();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(SessionView::initial(session_id.clone(), config.placeholder_seconds));

        let reconciler = SessionReconciler::new(
            session_id.clone(),
            language.into(),
            token.into(),
            SessionDeps {
                config,
                api,
                time,
                metrics,
            },
            events_tx.clone(),
            view_tx,
        );
        let task = tokio::spawn(reconciler.run(events_rx));

        Self {
            session_id,
            commands: events_tx,
            view: view_rx,
            task: Some(task),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn current_screen_state(&self) -> SessionScreenState {
        self.view.borrow().screen
    }

    /// Latest published view
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver notified on every view change
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Wait until the view satisfies `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> AppResult<SessionView>
    where
        F: FnMut(&SessionView) -> bool,
    {
        let mut rx = self.view.clone();
        let view = rx.wait_for(predicate).await.map_err(|_| AppError::SessionClosed)?;
        Ok(view.clone())
    }

    pub fn select_method(&self, method: PaymentMethod) -> AppResult<()> {
        self.send(SessionCommand::SelectMethod(method))
    }

    pub fn refresh_artifact(&self) -> AppResult<()> {
        self.send(SessionCommand::RefreshArtifact)
    }

    /// Record a success the guest asserts out of band
    pub fn confirm_manual_success(&self, kind: SuccessKind) -> AppResult<()> {
        self.send(SessionCommand::ConfirmManualSuccess(kind))
    }

    /// Submit a guarantee card and wait for the acknowledgement
    pub async fn submit_guarantee_card(&self, card: GuaranteeCard) -> AppResult<()> {
        let (reply, ack) = oneshot::channel();
        self.send(SessionCommand::SubmitGuaranteeCard { card, reply })?;
        ack.await.map_err(|_| AppError::SessionClosed)?
    }

    pub fn reload(&self) -> AppResult<()> {
        self.send(SessionCommand::Reload)
    }

    /// Stop all timers and wait for the reconciler to finish
    pub async fn close(mut self) -> AppResult<()> {
        let _ = self.send(SessionCommand::Close);
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| AppError::Internal(format!("Session task failed: {}", e)))?;
        }
        Ok(())
    }

    fn send(&self, command: SessionCommand) -> AppResult<()> {
        self.commands
            .send(SessionEvent::Command(command))
            .map_err(|_| AppError::SessionClosed)
    }
}

impl Drop for CheckoutSession {
    fn drop(&mut self) {
        if self.task.is_some() {
            debug!(session_id = %self.session_id, "Session dropped without close");
            let _ = self.commands.send(SessionEvent::Command(SessionCommand::Close));
        }
    }
}
