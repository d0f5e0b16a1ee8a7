//! Browser download events as seen by the relay.
//!
//! Field names follow the browser's `DownloadItem` / `DownloadDelta` JSON so
//! host adapters can deserialize events without a translation layer.

use serde::{Deserialize, Deserializer, Serialize};

use crate::clock::now_millis;
use crate::filename::{basename, filename_from_url};

/// Bytes per megabyte used for the size floor.
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Native download identifier assigned by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(pub u64);

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One browser-reported "download created" event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDescriptor {
    /// Native download id, valid only for this browser session.
    pub id: DownloadId,
    /// Requested URL. Empty when the browser did not report one.
    #[serde(default)]
    pub url: String,
    /// URL after redirects, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    /// Target filename or full local path, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Total size in bytes. `None` means unknown (browsers report 0 or -1).
    #[serde(
        default,
        deserialize_with = "deserialize_known_size",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_bytes: Option<u64>,
    /// Creation time in milliseconds since the epoch.
    #[serde(default = "now_millis")]
    pub created_at: u64,
}

impl DownloadDescriptor {
    /// Creates a descriptor with unknown filename and size.
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id: DownloadId(id),
            url: url.into(),
            final_url: None,
            filename: None,
            total_bytes: None,
            created_at: now_millis(),
        }
    }

    /// Sets the reported filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the reported total size.
    #[must_use]
    pub fn with_total_bytes(mut self, total_bytes: u64) -> Self {
        self.total_bytes = (total_bytes > 0).then_some(total_bytes);
        self
    }

    /// The URL used for matching: `url`, or `finalUrl` when `url` is empty.
    #[must_use]
    pub fn effective_url(&self) -> &str {
        if self.url.is_empty() {
            self.final_url.as_deref().unwrap_or_default()
        } else {
            &self.url
        }
    }

    /// Reported size in megabytes, if known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_mb(&self) -> Option<f64> {
        self.total_bytes.map(|bytes| bytes as f64 / BYTES_PER_MB)
    }

    /// Filename to record and forward: the reported name's last path
    /// component, or one derived from the URL.
    #[must_use]
    pub fn resolved_filename(&self) -> String {
        self.filename
            .as_deref()
            .map(basename)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| filename_from_url(self.effective_url()), str::to_string)
    }
}

fn deserialize_known_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(|bytes| u64::try_from(bytes).ok()).filter(|&bytes| bytes > 0))
}

/// Native download lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    InProgress,
    Interrupted,
    Complete,
}

/// Previous/current pair for one changed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta<T> {
    pub current: Option<T>,
    pub previous: Option<T>,
}

/// One browser-reported "download changed" event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDelta {
    pub id: DownloadId,
    /// URL of the download, when the host includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Delta<DownloadState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Delta<String>>,
}

impl DownloadDelta {
    /// True when the download transitioned to `complete`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.current == Some(DownloadState::Complete))
    }

    /// True when the browser reported an error for the download.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|error| error.current.is_some())
    }
}
