//! Dispatch engine: classifier, dedup guard, native cancel and daemon hand-off.
//!
//! Per URL the engine moves through
//!
//! ```text
//! Filtered (terminal)
//! Queued -> Cancelling -> Dispatching -> Succeeded | Failed
//! ```
//!
//! Everything up to `Queued` runs synchronously, so two events for the same
//! URL can never both reach `Dispatching`. Failures past that point end up in
//! history and a notification; nothing is returned to the event source as an
//! error.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::host::{BrowserHost, HostEvent, Notification};
use super::pending::{PendingDownload, PendingQueue};
use super::retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_RETRY_JITTER, RetryDecision, RetryPolicy,
    classify_error,
};
use crate::clock::now_millis;
use crate::dedup::{DEFAULT_DUPLICATE_WINDOW, DEFAULT_TRACKER_CAPACITY, DedupGuard, DedupVerdict};
use crate::filename::{UNKNOWN_FILENAME, filename_from_url};
use crate::intercept::{DownloadDelta, DownloadDescriptor, FilterReason, Verdict, classify};
use crate::rpc::{Daemon, HealthStatus, RpcError};
use crate::store::{HistoryStatus, SettingsStore, StoredMap};

/// Delay between native completion and forgetting the URL.
pub const DEFAULT_FORGET_GRACE: Duration = Duration::from_secs(30);

pub const MSG_SENT: &str = "Download sent to download manager";
pub const MSG_FAILED: &str = "Failed to send download to download manager";
pub const MSG_UNEXPECTED: &str = "Error processing download";
pub const MSG_INSTALLED: &str = "Download Relay installed successfully";
pub const MSG_UPDATED: &str = "Download Relay updated";

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub forget_grace: Duration,
    pub retry_base_delay: Duration,
    pub max_retry_delay: Duration,
    /// Random extra delay per retry, at most this much. Zero disables it.
    pub retry_jitter: Duration,
    pub tracker_capacity: usize,
    pub duplicate_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            forget_grace: DEFAULT_FORGET_GRACE,
            retry_base_delay: DEFAULT_BASE_DELAY,
            max_retry_delay: DEFAULT_MAX_DELAY,
            retry_jitter: DEFAULT_RETRY_JITTER,
            tracker_capacity: DEFAULT_TRACKER_CAPACITY,
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
        }
    }
}

/// Result of handling one "download created" event.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Not intercepted.
    Filtered(FilterReason),
    /// The daemon accepted the URL.
    Succeeded { url: String, gid: String },
    /// Every attempt failed.
    Failed { url: String, error: RpcError },
}

impl DispatchOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    #[must_use]
    pub fn filter_reason(&self) -> Option<FilterReason> {
        match self {
            Self::Filtered(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// One entry of an [`DispatchEngine::add_many`] batch result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub url: String,
    pub filename: String,
    pub status: HistoryStatus,
    pub timestamp: u64,
}

/// Why the host reported an install event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    #[serde(other)]
    Other,
}

struct Inner {
    store: Arc<SettingsStore>,
    daemon: Arc<dyn Daemon>,
    host: Arc<dyn BrowserHost>,
    dedup: DedupGuard,
    pending: PendingQueue,
    config: EngineConfig,
}

/// Process-wide dispatch context. Cheap to clone.
#[derive(Clone)]
pub struct DispatchEngine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("tracked", &self.inner.dedup.len())
            .field("pending", &self.inner.pending.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl DispatchEngine {
    #[must_use]
    pub fn new(
        store: Arc<SettingsStore>,
        daemon: Arc<dyn Daemon>,
        host: Arc<dyn BrowserHost>,
    ) -> Self {
        Self::with_config(store, daemon, host, EngineConfig::default())
    }

    /// Creates an engine with explicit tunables.
    ///
    /// # Arguments
    ///
    /// * `store` - Loaded settings and history
    /// * `daemon` - Receives `addUri` and health calls
    /// * `host` - Native download control and notifications
    /// * `config` - Grace period, retry backoff and dedup sizing
    #[must_use]
    pub fn with_config(
        store: Arc<SettingsStore>,
        daemon: Arc<dyn Daemon>,
        host: Arc<dyn BrowserHost>,
        config: EngineConfig,
    ) -> Self {
        let dedup = DedupGuard::new(config.tracker_capacity, config.duplicate_window);
        Self {
            inner: Arc::new(Inner {
                store,
                daemon,
                host,
                dedup,
                pending: PendingQueue::new(),
                config,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SettingsStore> {
        &self.inner.store
    }

    #[must_use]
    pub fn dedup(&self) -> &DedupGuard {
        &self.inner.dedup
    }

    /// Pending downloads as `(url, download)` pairs.
    #[must_use]
    pub fn pending_snapshot(&self) -> Vec<(String, PendingDownload)> {
        self.inner.pending.snapshot()
    }

    /// Handles a native "download created" event.
    ///
    /// This will:
    /// 1. Consume the skip flag, if set, and stop
    /// 2. Classify the descriptor against the current settings
    /// 3. Remember the URL, dropping tracked URLs and repeats inside the window
    /// 4. Cancel and erase the native download
    /// 5. Send the URL to the daemon with retries
    /// 6. Record one history entry, notify and persist
    ///
    /// A failed hand-off forgets the URL so the user can try again.
    #[instrument(skip(self, descriptor), fields(id = %descriptor.id, url = %descriptor.effective_url()))]
    pub async fn on_download_created(&self, descriptor: DownloadDescriptor) -> DispatchOutcome {
        if self.inner.store.take_skip_next().await {
            info!("skipping download, skip flag cleared");
            return DispatchOutcome::Filtered(FilterReason::SkipNext);
        }

        let settings = self.inner.store.settings();
        if let Verdict::Reject(reason) = classify(&descriptor, &settings) {
            debug!(%reason, "download not intercepted");
            return DispatchOutcome::Filtered(reason);
        }

        let url = descriptor.effective_url().to_string();
        match self.inner.dedup.check_and_remember(&url) {
            DedupVerdict::Fresh => {}
            DedupVerdict::Tracked => {
                debug!("download already tracked");
                return DispatchOutcome::Filtered(FilterReason::AlreadyTracked);
            }
            DedupVerdict::WithinWindow => {
                debug!("duplicate event within window");
                return DispatchOutcome::Filtered(FilterReason::RecentlySeen);
            }
        }

        let pending = PendingDownload {
            url: url.clone(),
            filename: descriptor.resolved_filename(),
            timestamp: now_millis(),
            retry_count: settings.retry_count(),
        };
        self.inner.pending.insert(pending.clone());
        info!(filename = %pending.filename, retry_count = pending.retry_count, "download queued");

        self.cancel_native(&descriptor).await;

        let result = self.send_with_retry(&pending).await;
        self.inner.pending.remove(&url);

        let outcome = match result {
            Ok(gid) => {
                info!(gid = %gid, "download handed off");
                self.inner
                    .store
                    .record(&url, &pending.filename, HistoryStatus::Success);
                self.notify(Notification::success(MSG_SENT));
                DispatchOutcome::Succeeded { url, gid }
            }
            Err(error) => {
                warn!(error = %error, "download hand-off failed");
                self.inner.dedup.forget(&url);
                self.inner
                    .store
                    .record(&url, &pending.filename, HistoryStatus::Error);
                self.notify(Notification::error(MSG_FAILED));
                DispatchOutcome::Failed { url, error }
            }
        };

        self.persist_history().await;
        outcome
    }

    /// Handles a native "download changed" event.
    #[instrument(skip(self, delta), fields(id = %delta.id))]
    pub fn on_download_changed(&self, delta: &DownloadDelta) {
        let Some(url) = delta.url.clone().filter(|url| !url.is_empty()) else {
            return;
        };

        if delta.is_complete() {
            let engine = self.clone();
            let grace = self.inner.config.forget_grace;
            debug!(url = %url, grace_secs = grace.as_secs(), "scheduling forget");
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                engine.inner.dedup.forget(&url);
                engine.inner.pending.remove(&url);
            });
        } else if delta.is_error() && self.inner.pending.remove(&url).is_some() {
            debug!(url = %url, "removed pending download after native error");
        }
    }

    /// Sends user-supplied URLs straight to the daemon, one attempt each.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn add_many(&self, urls: &[String]) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls.iter().map(|url| url.trim()).filter(|url| !url.is_empty()) {
            let endpoint = self.inner.store.settings().endpoint_url;
            let success = self.inner.daemon.add_uri(&endpoint, url, None).await;
            let filename = filename_from_url(url);
            let status = HistoryStatus::from_success(success);
            self.inner.store.record(url, &filename, status);
            debug!(url, %status, "batch entry processed");
            outcomes.push(BatchOutcome {
                url: url.to_string(),
                filename,
                status,
                timestamp: now_millis(),
            });
        }

        if !outcomes.is_empty() {
            self.persist_history().await;
        }
        outcomes
    }

    /// Probes the configured daemon.
    pub async fn check_connection(&self) -> HealthStatus {
        let endpoint = self.inner.store.settings().endpoint_url;
        self.inner.daemon.check_health(&endpoint).await
    }

    /// Applies a storage change notification.
    pub fn on_storage_changed(&self, changes: &StoredMap) {
        self.inner.store.apply_storage_changes(changes);
    }

    /// Reloads settings from the store.
    pub async fn on_startup(&self) {
        if let Err(error) = self.inner.store.load().await {
            warn!(error = %error, "failed to load settings, keeping current values");
        }
    }

    /// Greets the user after install or update.
    pub fn on_installed(&self, reason: InstallReason) {
        match reason {
            InstallReason::Install => self.notify(Notification::success(MSG_INSTALLED)),
            InstallReason::Update => self.notify(Notification::info(MSG_UPDATED)),
            InstallReason::Other => {}
        }
    }

    /// Shows a notification, logging failures.
    pub fn notify(&self, notification: Notification) {
        if let Err(error) = self.inner.host.show_notification(notification) {
            warn!(error = %error, "failed to show notification");
        }
    }

    /// Tells listeners the history changed. Nobody listening is fine.
    pub fn emit_history_updated(&self) {
        if let Err(error) = self.inner.host.emit(HostEvent::HistoryUpdated) {
            debug!(error = %error, "historyUpdated not delivered");
        }
    }

    async fn persist_history(&self) {
        self.inner.store.save_or_warn().await;
        self.emit_history_updated();
    }

    async fn cancel_native(&self, descriptor: &DownloadDescriptor) {
        let host = &self.inner.host;
        match host.cancel_download(descriptor.id).await {
            Ok(()) => {
                if let Err(error) = host.erase_download(descriptor.id).await {
                    warn!(error = %error, "failed to erase native download");
                }
            }
            Err(error) => warn!(error = %error, "failed to cancel native download"),
        }
    }

    async fn send_with_retry(&self, pending: &PendingDownload) -> Result<String, RpcError> {
        let config = &self.inner.config;
        let policy = RetryPolicy::with_retry_count(pending.retry_count)
            .with_delays(config.retry_base_delay, config.max_retry_delay)
            .with_jitter(config.retry_jitter);
        let filename = Some(pending.filename.as_str()).filter(|name| *name != UNKNOWN_FILENAME);

        let mut attempt = 1;
        loop {
            let endpoint = self.inner.store.settings().endpoint_url;
            let error = match self
                .inner
                .daemon
                .send_add_uri(&endpoint, &pending.url, filename)
                .await
            {
                Ok(gid) => return Ok(gid),
                Err(error) => error,
            };

            let failure = classify_error(&error);
            warn!(attempt, ?failure, error = %error, "addUri attempt failed");
            match policy.should_retry(failure, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "giving up");
                    return Err(error);
                }
            }
        }
    }
}
