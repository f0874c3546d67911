//! Retry logic with exponential backoff for relay failures.
//!
//! Two loops share the [`RetryPolicy`] type:
//!
//! - The chunk loop inside the upload session retries one push in place after
//!   sink-side transient errors ([`FailureType::Transient`]). Those retries do
//!   not re-read the source and do not count as transfer attempts.
//! - The transfer loop ([`run_with_retries`]) restarts the whole relay (new
//!   session, source re-read from byte 0) after session-level failures
//!   ([`FailureType::SessionLevel`]).
//!
//! Everything else is [`FailureType::Terminal`] and is reported immediately.
//!
//! # Example
//!
//! ```
//! use relay_core::relay::{RelayError, RetryPolicy, RetryDecision, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = RelayError::SessionExpired { session_uri: "https://sink/s/1".to_string() };
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Restarting in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use super::RelayError;

/// Default maximum transfer attempts (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Default maximum jitter added to delays (500ms).
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of relay failures for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Sink-side hiccup on a single request; retry the same request in place.
    ///
    /// Examples: 5xx on a chunk push, connection reset while pushing.
    Transient,

    /// The upload session is unusable; restart the whole transfer.
    ///
    /// Examples: session expired (404), malformed continuation response,
    /// missing session location, chunk retry cap exhausted.
    SessionLevel,

    /// Retrying cannot change the outcome.
    ///
    /// Examples: source unreachable, bad source status, missing length.
    Terminal,
}

/// Decision on whether to retry a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `base_delay`: 1 second
/// - `max_delay`: 32 seconds
/// - `backoff_multiplier`: 2.0
/// - `max_jitter`: 500ms
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Base delay for the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Multiplier applied each attempt (typically 2.0 for doubling).
    backoff_multiplier: f32,

    /// Upper bound of the random jitter added to every delay.
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum attempts including initial (must be >= 1)
    /// * `base_delay` - Base delay for first retry
    /// * `max_delay` - Maximum delay cap
    /// * `backoff_multiplier` - Multiplier for exponential increase
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Replaces the jitter bound. Zero makes delays deterministic.
    #[must_use]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Policy without any waiting between attempts.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0).with_max_jitter(Duration::ZERO)
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry a failed operation.
    ///
    /// # Arguments
    ///
    /// * `failure_type` - Classification of the failure
    /// * `attempt` - The attempt number that just failed (1-indexed)
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Terminal {
            return RetryDecision::DoNotRetry {
                reason: "terminal failure - retry would not help".to_string(),
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

    /// Calculates the delay for a retry attempt with exponential backoff and jitter.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);

        // attempt 1 = multiplier^0 = 1x base
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);

        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    /// Random jitter between 0 and `max_jitter`, so concurrent relays hitting
    /// the same sink outage do not retry in lockstep.
    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let bound = self.max_jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=bound);
        Duration::from_millis(jitter_ms)
    }
}

/// Classifies a relay error for the transfer-level retry loop.
///
/// | Error | Type | Rationale |
/// |-------|------|-----------|
/// | `SessionExpired` | `SessionLevel` | Sink dropped the session; a new one can succeed |
/// | `SinkProtocol` | `SessionLevel` | Session bookkeeping is unreliable; start over |
/// | `SinkTransient` | `SessionLevel` | Chunk retries exhausted; a fresh session may succeed |
/// | `InvalidUrl`, `UnsupportedScheme` | `Terminal` | Input won't change |
/// | `SourceUnreachable`, `InvalidResponse` | `Terminal` | Source-side, reported not retried |
/// | `SinkFatal`, `InvalidState` | `Terminal` | Rejected by the sink or caller bug |
/// | `PostFinalize` | `Terminal` | Artifact exists; re-uploading would duplicate it |
/// | `NotFound`, `RetriesExhausted`, `Cancelled` | `Terminal` | Final outcomes |
#[must_use]
pub fn classify_error(error: &RelayError) -> FailureType {
    match error {
        RelayError::SessionExpired { .. }
        | RelayError::SinkProtocol { .. }
        | RelayError::SinkTransient { .. } => FailureType::SessionLevel,

        RelayError::InvalidUrl { .. }
        | RelayError::UnsupportedScheme { .. }
        | RelayError::SourceUnreachable { .. }
        | RelayError::InvalidResponse { .. }
        | RelayError::SinkFatal { .. }
        | RelayError::NotFound { .. }
        | RelayError::InvalidState { .. }
        | RelayError::PostFinalize { .. }
        | RelayError::RetriesExhausted { .. }
        | RelayError::Cancelled => FailureType::Terminal,
    }
}

/// Runs a full transfer attempt up to `policy.max_attempts()` times.
///
/// The closure receives the 1-indexed attempt number. Session-level failures
/// start a new attempt after the backoff delay; terminal failures are returned
/// unchanged. When the attempts run out the last failure is wrapped in
/// [`RelayError::RetriesExhausted`] so callers can tell the two apart.
///
/// On success, returns the value together with the number of attempts used.
///
/// # Errors
///
/// Returns the terminal failure, or [`RelayError::RetriesExhausted`].
pub async fn run_with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    url: &str,
    mut attempt_fn: F,
) -> Result<(T, u32), RelayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(url = %url, attempt, "starting transfer attempt");

        let error = match attempt_fn(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(error) => error,
        };

        let failure_type = classify_error(&error);
        match policy.should_retry(failure_type, attempt) {
            RetryDecision::Retry {
                delay,
                attempt: next_attempt,
            } => {
                warn!(
                    url = %url,
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "restarting transfer"
                );
                tokio::time::sleep(delay).await;
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(url = %url, %reason, "not retrying transfer");
                if failure_type == FailureType::Terminal {
                    return Err(error);
                }
                return Err(RelayError::retries_exhausted(attempt, error));
            }
        }
    }
}
