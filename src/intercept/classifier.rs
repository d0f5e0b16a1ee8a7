//! Interception policy: which browser downloads go to the daemon.
//!
//! The classifier is a pure function of a [`DownloadDescriptor`] and the
//! current [`Settings`]. It performs no I/O and keeps no state; duplicate
//! suppression happens later in [`crate::dedup`].
//!
//! Checks run in this order, first rejection wins:
//!
//! 1. one-shot `skipNext` flag
//! 2. URL present and using an accepted scheme (`http`, `https`, `ftp`, `magnet`)
//! 3. magnet links are accepted outright (they never carry size metadata)
//! 4. filename or URL contains an allow-listed suffix
//! 5. size floor (`minSizeMB`), unknown size rejected when the floor is non-zero

use std::fmt;

use tracing::trace;
use url::Url;

use super::DownloadDescriptor;
use crate::store::Settings;

/// File-type suffixes eligible for interception.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    // archives
    ".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz",
    // video
    ".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v",
    // audio
    ".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a", ".wma",
    // installers
    ".exe", ".msi", ".dmg", ".deb", ".rpm", ".pkg", ".app",
    // disk images
    ".iso", ".img", ".bin", ".vhd", ".vmdk",
    // torrents and documents
    ".torrent", ".pdf", ".epub", ".mobi",
    // mobile packages
    ".apk", ".ipa",
];

/// Schemes the daemon can fetch.
const ACCEPTED_SCHEMES: &[&str] = &["http", "https", "ftp", "magnet"];

const MAGNET_PREFIX: &str = "magnet:";

/// Why a descriptor was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// The one-shot skip flag was set.
    SkipNext,
    /// No URL was reported.
    MissingUrl,
    /// `file:`, `data:`, browser-internal or otherwise unsupported scheme.
    UnsupportedScheme,
    /// Neither filename nor URL matched the allow-list.
    UnsupportedType,
    /// A size floor is configured and the size is unknown.
    UnknownSize,
    /// The reported size is below the floor.
    BelowMinimumSize,
    /// The URL is already queued or was recently sent.
    AlreadyTracked,
    /// Another event for the same URL arrived within the duplicate window.
    RecentlySeen,
}

impl FilterReason {
    /// Stable label for logs and outcomes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SkipNext => "skip_next",
            Self::MissingUrl => "missing_url",
            Self::UnsupportedScheme => "unsupported_scheme",
            Self::UnsupportedType => "unsupported_type",
            Self::UnknownSize => "unknown_size",
            Self::BelowMinimumSize => "below_minimum_size",
            Self::AlreadyTracked => "already_tracked",
            Self::RecentlySeen => "recently_seen",
        }
    }
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier decision for one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Intercept,
    Reject(FilterReason),
}

impl Verdict {
    #[must_use]
    pub fn is_intercept(self) -> bool {
        matches!(self, Self::Intercept)
    }
}

/// Returns `true` when the descriptor should be redirected to the daemon.
#[must_use]
pub fn should_intercept(descriptor: &DownloadDescriptor, settings: &Settings) -> bool {
    classify(descriptor, settings).is_intercept()
}

/// Classifies a descriptor against the current policy.
///
/// Checks run in order and the first rejection wins:
/// 1. `skipNext` set
/// 2. Missing URL, then unsupported scheme
/// 3. Magnet links are accepted here, without type or size checks
/// 4. Extension allow-list, minus `excludedExt`
/// 5. Size floor, when `minSizeMB > 0`; an unknown size is rejected
///
/// # Arguments
///
/// * `descriptor` - The native download as reported by the host
/// * `settings` - Snapshot of the current settings
#[must_use]
pub fn classify(descriptor: &DownloadDescriptor, settings: &Settings) -> Verdict {
    let verdict = classify_inner(descriptor, settings);
    trace!(url = %descriptor.effective_url(), ?verdict, "classified download");
    verdict
}

fn classify_inner(descriptor: &DownloadDescriptor, settings: &Settings) -> Verdict {
    if settings.skip_next {
        return Verdict::Reject(FilterReason::SkipNext);
    }

    let url = descriptor.effective_url();
    if url.is_empty() {
        return Verdict::Reject(FilterReason::MissingUrl);
    }
    if !is_valid_download_url(url) {
        return Verdict::Reject(FilterReason::UnsupportedScheme);
    }

    if is_magnet(url) {
        return Verdict::Intercept;
    }

    let filename = descriptor.filename.as_deref().unwrap_or_default();
    if !matches_supported_extension(filename, url, settings.excluded_ext.as_deref()) {
        return Verdict::Reject(FilterReason::UnsupportedType);
    }

    if settings.min_size_mb > 0.0 {
        return match descriptor.size_mb() {
            Some(size_mb) if size_mb >= settings.min_size_mb => Verdict::Intercept,
            Some(_) => Verdict::Reject(FilterReason::BelowMinimumSize),
            None => Verdict::Reject(FilterReason::UnknownSize),
        };
    }

    Verdict::Intercept
}

/// Returns `true` for URLs the daemon can fetch.
///
/// Rejects empty strings, local files, data URIs and browser-internal pages.
/// A string that does not parse as a URL is accepted only as a magnet link.
#[must_use]
pub fn is_valid_download_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    match Url::parse(url) {
        Ok(parsed) => ACCEPTED_SCHEMES.contains(&parsed.scheme()),
        Err(_) => is_magnet(url),
    }
}

fn is_magnet(url: &str) -> bool {
    url.get(..MAGNET_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(MAGNET_PREFIX))
}

/// Case-insensitive substring match of the allow-list against filename and URL.
///
/// `excluded` removes suffixes from the allow-list; entries may omit the
/// leading dot.
#[must_use]
pub fn matches_supported_extension(filename: &str, url: &str, excluded: Option<&[String]>) -> bool {
    let filename = filename.to_lowercase();
    let url = url.to_lowercase();
    let excluded: Vec<String> = excluded
        .unwrap_or_default()
        .iter()
        .map(|ext| normalize_extension(ext))
        .collect();

    SUPPORTED_EXTENSIONS
        .iter()
        .filter(|ext| !excluded.iter().any(|skip| skip == *ext))
        .any(|ext| filename.contains(ext) || url.contains(ext))
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}
