//! Seam to the browser host: native download control and user notifications.
//!
//! Every call is best-effort. The engine logs failures and carries on.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::intercept::DownloadId;

/// Title shown on every notification.
pub const NOTIFICATION_TITLE: &str = "Download Relay";

/// Errors raised by a [`BrowserHost`].
#[derive(Debug, Error)]
pub enum HostError {
    /// The channel to the host is gone.
    #[error("host channel closed")]
    ChannelClosed,

    /// The host refused the operation (download already finished, removed).
    #[error("host rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    /// Nobody is listening for the event.
    #[error("no listener for event")]
    NoListener,
}

impl HostError {
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            reason: reason.into(),
        }
    }
}

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationKind {
    /// Marker prefixed to the message.
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::Success => "🟢",
            Self::Error => "🔴",
            Self::Warning => "🟡",
            Self::Info => "🔵",
        }
    }
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    /// Builds a notification with the standard title and kind marker.
    #[must_use]
    pub fn new(kind: NotificationKind, message: &str) -> Self {
        Self {
            kind,
            title: NOTIFICATION_TITLE.to_string(),
            message: format!("{} {message}", kind.marker()),
        }
    }

    #[must_use]
    pub fn success(message: &str) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    #[must_use]
    pub fn error(message: &str) -> Self {
        Self::new(NotificationKind::Error, message)
    }

    #[must_use]
    pub fn info(message: &str) -> Self {
        Self::new(NotificationKind::Info, message)
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Fire-and-forget events for listeners such as an open settings page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    HistoryUpdated,
}

/// Browser-side operations the engine needs.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Cancels the native download.
    async fn cancel_download(&self, id: DownloadId) -> Result<(), HostError>;

    /// Removes the native download from the browser's list.
    async fn erase_download(&self, id: DownloadId) -> Result<(), HostError>;

    /// Shows a notification.
    fn show_notification(&self, notification: Notification) -> Result<(), HostError>;

    /// Broadcasts an event. Failing because nobody listens is normal.
    fn emit(&self, event: HostEvent) -> Result<(), HostError>;
}
