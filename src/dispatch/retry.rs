//! Retry logic with exponential backoff for daemon hand-off.
//!
//! A failed `addUri` is classified into a [`FailureType`]. Transport and
//! protocol failures are both retried; only configuration problems (an
//! endpoint that is not a URL, a client that cannot be built) stop early.
//!
//! # Example
//!
//! ```
//! use relay_core::dispatch::{RetryDecision, RetryPolicy};
//! use relay_core::dispatch::FailureType;
//!
//! let policy = RetryPolicy::with_retry_count(3);
//! match policy.should_retry(FailureType::Transient, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(attempt, 2);
//!         assert_eq!(delay.as_secs(), 2);
//!     }
//!     RetryDecision::DoNotRetry { reason } => panic!("{reason}"),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use crate::rpc::RpcError;

/// Delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Upper bound for any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Upper bound for the random delay added to each retry.
pub const DEFAULT_RETRY_JITTER: Duration = Duration::from_millis(500);

/// Multiplier applied per retry.
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Classification of daemon call failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Network error, timeout or non-2xx status.
    Transient,

    /// The daemon answered with a JSON-RPC error or an unusable body.
    ///
    /// Retried like a transient failure.
    Protocol,

    /// Retrying cannot help (bad endpoint, no HTTP client).
    Permanent,
}

/// Decision on whether to retry a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after `delay`.
    Retry {
        delay: Duration,
        /// 1-indexed attempt number about to run.
        attempt: u32,
    },

    /// Stop.
    DoNotRetry { reason: String },
}

/// Backoff configuration.
///
/// ```text
/// delay(n) = min(base_delay * multiplier^(n-1), max_delay) + jitter
/// ```
///
/// where `n` is the attempt that just failed. `jitter` is drawn uniformly
/// from `0..=max_jitter`; the default policy has none, the engine adds
/// [`DEFAULT_RETRY_JITTER`] unless configured otherwise.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// One initial attempt plus `retry_count` retries, default delays.
    #[must_use]
    pub fn with_retry_count(retry_count: u32) -> Self {
        Self {
            max_attempts: retry_count.saturating_add(1),
            ..Self::default()
        }
    }

    /// Adds up to `max_jitter` of random delay to each retry.
    #[must_use]
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Overrides base and cap delays.
    #[must_use]
    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what to do after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=max_ms);
        Duration::from_millis(jitter_ms)
    }
}

/// Classifies a daemon call error.
///
/// | Error | Type |
/// |-------|------|
/// | Network, Timeout, HttpStatus | Transient |
/// | Rpc, MalformedResponse, EmptyResult | Protocol |
/// | InvalidEndpoint, ClientBuild | Permanent |
#[must_use]
pub fn classify_error(error: &RpcError) -> FailureType {
    match error {
        RpcError::Network { .. } | RpcError::Timeout { .. } | RpcError::HttpStatus { .. } => {
            FailureType::Transient
        }
        RpcError::Rpc { .. } | RpcError::MalformedResponse { .. } | RpcError::EmptyResult { .. } => {
            FailureType::Protocol
        }
        RpcError::InvalidEndpoint { .. } | RpcError::ClientBuild(_) => FailureType::Permanent,
    }
}
