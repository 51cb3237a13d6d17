//! Bounded retry with exponential backoff.
//!
//! The executor is backend-agnostic: it drives any fallible async operation,
//! classifies failures through [`Error::is_retryable`], and reports how many
//! attempts were actually made so callers can stamp provenance metadata.

use crate::config::BackendConfig;
use crate::{Error, ErrorKind, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry logic
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Never below 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Policy for one backend; a configured retry count of 0 still allows a single attempt.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(
            config.max_retries(),
            config.retry_delay(),
            config.max_retry_delay(),
            config.backoff_multiplier(),
        )
    }

    /// A single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, 1.0)
    }

    /// Delay inserted after the `attempt`-th failure (1-based):
    /// `min(base_delay * multiplier^(attempt - 1), max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let scaled = self.base_delay.as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled)
        }
    }

    /// Delay before the next attempt after `err`. A rate-limit hint from the
    /// backend replaces the computed backoff but still respects `max_delay`.
    fn delay_after(&self, attempt: u32, err: &Error) -> Duration {
        match (err.kind(), err.context().retry_after) {
            (ErrorKind::RateLimit, Some(hint)) => hint.min(self.max_delay),
            _ => self.delay_for_attempt(attempt),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_MAX_RETRIES,
            crate::config::DEFAULT_RETRY_DELAY,
            crate::config::DEFAULT_MAX_RETRY_DELAY,
            crate::config::DEFAULT_BACKOFF_MULTIPLIER,
        )
    }
}

/// Result of a retried operation plus the number of attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

impl<T> RetryOutcome<T> {
    /// Attempts beyond the first.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` is reached.
///
/// The closure receives the 1-based attempt number. Attempts run strictly one
/// after another; the backoff wait suspends the calling task.
pub async fn execute_with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(err) => {
                if !err.is_retryable() {
                    debug!(attempt, error_kind = ?err.kind(), "non-retryable failure");
                    return RetryOutcome {
                        result: Err(err),
                        attempts: attempt,
                    };
                }
                if attempt >= max_attempts {
                    debug!(attempt, error_kind = ?err.kind(), "retry attempts exhausted");
                    return RetryOutcome {
                        result: Err(err),
                        attempts: attempt,
                    };
                }

                let delay = policy.delay_after(attempt, &err);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
