//! Filename derivation and sanitization for forwarded downloads.
//!
//! Browsers often report no filename when a download is first created, so the
//! relay falls back to the URL. Whatever name is chosen is sanitized before it
//! is sent to the daemon as the `out` option.

use url::Url;

/// Maximum length (in characters) of a forwarded filename.
pub const MAX_FILENAME_LEN: usize = 255;

/// Placeholder used when no name can be derived from a URL.
pub const UNKNOWN_FILENAME: &str = "unknown";

/// Derives a display filename from a URL.
///
/// - `http(s)`/`ftp`: last path segment, percent-decoded
/// - `magnet`: the `dn` (display name) parameter
/// - anything else, or an empty segment: [`UNKNOWN_FILENAME`]
#[must_use]
pub fn filename_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return UNKNOWN_FILENAME.to_string();
    };

    if parsed.scheme() == "magnet" {
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "dn")
            .map(|(_, value)| value.into_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_FILENAME.to_string());
    }

    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .filter(|last| !last.is_empty())
        .map(|last| {
            urlencoding::decode(&last)
                .map(std::borrow::Cow::into_owned)
                .unwrap_or(last)
        })
        .unwrap_or_else(|| UNKNOWN_FILENAME.to_string())
}

/// Returns the final component of a browser-reported path.
///
/// Browsers report the full local target path (`/home/u/Downloads/a.zip` or
/// `C:\Users\u\Downloads\a.zip`); only the last component is meaningful to the
/// daemon.
#[must_use]
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Sanitizes a filename before it is handed to the daemon.
///
/// Replaces path separators and characters invalid on common filesystems
/// (`/ \ < > : " | ? *` and control characters) with `_`, collapses a run of
/// leading dots into a single `_` so the result is never hidden or a
/// traversal segment, trims surrounding whitespace and caps the length at
/// [`MAX_FILENAME_LEN`] characters.
///
/// Returns `None` when nothing usable remains.
#[must_use]
pub fn sanitize_filename(name: &str) -> Option<String> {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let without_dots = replaced.trim_start_matches('.');
    let mut sanitized = if without_dots.len() == replaced.len() {
        replaced
    } else {
        format!("_{without_dots}")
    };

    sanitized = sanitized.trim().chars().take(MAX_FILENAME_LEN).collect();

    (!sanitized.is_empty()).then_some(sanitized)
}
