//! Browser download events and the interception policy applied to them.
//!
//! - [`DownloadDescriptor`] / [`DownloadDelta`] - event payloads from the host
//! - [`classify`] / [`should_intercept`] - pure intercept-or-ignore decision

mod classifier;
mod descriptor;

pub use classifier::{
    FilterReason, SUPPORTED_EXTENSIONS, Verdict, classify, is_valid_download_url,
    matches_supported_extension, should_intercept,
};
pub use descriptor::{Delta, DownloadDelta, DownloadDescriptor, DownloadId, DownloadState};
