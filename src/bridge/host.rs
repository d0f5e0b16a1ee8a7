//! Frames exchanged with the browser shim and a channel-backed [`BrowserHost`].
//!
//! The shim owns the real browser APIs. Commands such as cancel or erase are
//! sent without waiting for an acknowledgement; the shim ignores failures for
//! downloads that already finished.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use crate::dispatch::{BrowserHost, HostError, HostEvent, InstallReason, Notification};
use crate::intercept::{DownloadDelta, DownloadDescriptor, DownloadId};
use crate::messages::ControlResponse;
use crate::store::StoredMap;

/// Storage area whose changes are applied.
const LOCAL_AREA: &str = "local";

/// Events and requests from the browser shim.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundFrame {
    DownloadCreated {
        item: DownloadDescriptor,
    },
    DownloadChanged {
        delta: DownloadDelta,
    },
    StorageChanged {
        changes: StoredMap,
        /// Storage area name; changes to other areas are ignored.
        #[serde(default)]
        area: Option<String>,
    },
    Message {
        #[serde(rename = "requestId")]
        request_id: Value,
        request: Value,
    },
    Installed {
        reason: InstallReason,
    },
    Startup,
}

impl InboundFrame {
    /// Frame type name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DownloadCreated { .. } => "downloadCreated",
            Self::DownloadChanged { .. } => "downloadChanged",
            Self::StorageChanged { .. } => "storageChanged",
            Self::Message { .. } => "message",
            Self::Installed { .. } => "installed",
            Self::Startup => "startup",
        }
    }
}

/// True when a storage change comes from the area settings live in.
#[must_use]
pub fn is_settings_area(area: Option<&str>) -> bool {
    area.is_none_or(|area| area == LOCAL_AREA)
}

/// Commands and replies sent to the browser shim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundFrame {
    CancelDownload {
        id: DownloadId,
    },
    EraseDownload {
        id: DownloadId,
    },
    Notification(Notification),
    HistoryUpdated,
    Response {
        #[serde(rename = "requestId")]
        request_id: Value,
        response: ControlResponse,
    },
}

/// [`BrowserHost`] that queues [`OutboundFrame`]s on a channel.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl ChannelHost {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self { tx }
    }

    /// Queues a frame for the writer.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ChannelClosed`] once the writer has stopped.
    pub fn send(&self, frame: OutboundFrame) -> Result<(), HostError> {
        trace!(?frame, "queueing outbound frame");
        self.tx.send(frame).map_err(|_| HostError::ChannelClosed)
    }
}

#[async_trait]
impl BrowserHost for ChannelHost {
    async fn cancel_download(&self, id: DownloadId) -> Result<(), HostError> {
        self.send(OutboundFrame::CancelDownload { id })
    }

    async fn erase_download(&self, id: DownloadId) -> Result<(), HostError> {
        self.send(OutboundFrame::EraseDownload { id })
    }

    fn show_notification(&self, notification: Notification) -> Result<(), HostError> {
        self.send(OutboundFrame::Notification(notification))
    }

    fn emit(&self, event: HostEvent) -> Result<(), HostError> {
        match event {
            HostEvent::HistoryUpdated => self.send(OutboundFrame::HistoryUpdated),
        }
    }
}
