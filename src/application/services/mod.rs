//! Application services - Timers, loaders and the session reconciler

pub mod countdown_clock;
pub mod order_loader;
pub mod qr_provisioner;
pub mod reconciler;
pub mod status_poller;

pub use countdown_clock::{ClockEvent, CountdownClock};
pub use order_loader::OrderSessionLoader;
pub use qr_provisioner::QrProvisioner;
pub use reconciler::{
    LoadPurpose, SessionCommand, SessionDeps, SessionNotice, SessionReconciler, SessionView, TimerStatus,
};
pub use status_poller::StatusPoller;
