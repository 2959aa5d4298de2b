//! Bounded exponential backoff for rate-limited calls.
//!
//! Only failures the service signals as rate limiting are retried; any
//! other failure surfaces immediately without another attempt.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::metrics::record_retry;

/// Classification hook for the retry controller.
///
/// Implementors answer exactly one question: is this error the remote
/// service's rate-limit signal?
pub trait RetryClass {
    fn is_rate_limited(&self) -> bool;
}

/// Backoff policy for rate-limited calls.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Maximum number of attempts before giving up.
    pub max_retries: u32,
    /// Delay before the first retry (doubles each retry by default).
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(2000),
            multiplier: 2,
        }
    }
}

impl BackoffPolicy {
    /// Set the maximum number of attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before retry number `retry` (0-indexed): `initial * multiplier^retry`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(self.multiplier.saturating_pow(retry))
    }
}

/// Error from [`retry_rate_limited`].
#[derive(Debug)]
pub enum RetryError<E> {
    /// The rate limit persisted through every allowed attempt.
    Exhausted { attempts: u32, last: E },
    /// A non-rate-limit failure; surfaced unchanged, never retried.
    Fatal(E),
}

/// Execute `operation` with bounded exponential backoff.
///
/// Rate-limited failures (per [`RetryClass`]) are retried up to
/// `policy.max_retries` total attempts, sleeping `initial * multiplier^k`
/// before the k-th retry. Any other failure is returned immediately as
/// [`RetryError::Fatal`].
pub async fn retry_rate_limited<F, Fut, T, E>(
    policy: &BackoffPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryClass + std::fmt::Display,
{
    let mut failures = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() => {
                failures += 1;
                if failures >= policy.max_retries {
                    return Err(RetryError::Exhausted {
                        attempts: failures,
                        last: e,
                    });
                }

                let delay = policy.delay_for_retry(failures - 1);
                warn!(
                    operation = %operation_name,
                    attempt = failures,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off: {}",
                    e
                );
                record_retry(operation_name);

                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(RetryError::Fatal(e)),
        }
    }
}
