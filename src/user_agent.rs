//! User-Agent strings used by the relay.
//!
//! Two different agents are involved: the relay's own HTTP client talking to
//! the daemon, and the browser-like agent the daemon should present to the
//! origin server when it fetches the file.

/// Browser User-Agent forwarded to the daemon in `addUri` options.
///
/// Some origins reject requests that do not look like they come from a
/// browser, and the daemon would otherwise send its own identifier.
pub const FORWARDED_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// User-Agent of the relay's own JSON-RPC requests.
#[must_use]
pub(crate) fn relay_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("download-relay/{version}")
}
