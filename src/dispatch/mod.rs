//! Orchestration of intercepted downloads.
//!
//! - [`DispatchEngine`] - event handlers wired to the host adapter
//! - [`RetryPolicy`] / [`classify_error`] - backoff for daemon hand-off
//! - [`PendingQueue`] - downloads between interception and a terminal outcome
//! - [`BrowserHost`] - native download control and notifications

mod engine;
mod host;
mod pending;
mod retry;

pub use engine::{
    BatchOutcome, DEFAULT_FORGET_GRACE, DispatchEngine, DispatchOutcome, EngineConfig,
    InstallReason, MSG_FAILED, MSG_INSTALLED, MSG_SENT, MSG_UNEXPECTED, MSG_UPDATED,
};
pub use host::{
    BrowserHost, HostError, HostEvent, NOTIFICATION_TITLE, Notification, NotificationKind,
};
pub use pending::{PendingDownload, PendingQueue};
pub use retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_RETRY_JITTER, FailureType, RetryDecision,
    RetryPolicy, classify_error,
};
