//! Bounded exponential-backoff retries for remote calls.
//!
//! Every network-facing component (schedule lookup, model inference,
//! calendar and storage calls) shares one policy: wait `unit * 2^attempt`
//! after a transient failure, give up after `max_attempts` tries. Errors
//! classify themselves through [`Retryable`]; permanent errors are returned
//! immediately without consuming further attempts.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Default number of attempts before giving up.
const DEFAULT_MAX_ATTEMPTS: u32 = 7;

/// Default backoff unit (the delay after the first failure).
const DEFAULT_UNIT: Duration = Duration::from_secs(1);

/// Classification of an error for the retry loop.
pub trait Retryable {
    /// Whether another attempt may succeed.
    fn is_transient(&self) -> bool;
}

/// Retry policy shared by all remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles on each further failure.
    pub unit: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given attempt count and backoff unit.
    pub fn new(max_attempts: u32, unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            unit,
        }
    }

    /// A policy that retries without sleeping (for tests).
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Delay to wait after the failure of `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.unit.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_UNIT)
    }
}

/// Failure of a retried operation.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The error was classified as permanent; no further attempts were made.
    #[error("{0}")]
    Permanent(E),

    /// Every attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
///
/// `op` receives the zero-based attempt index, which callers use to rotate
/// between alternatives (e.g. candidate models).
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let mut attempt = 0;
    loop {
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_transient() {
            return Err(RetryError::Permanent(err));
        }

        if attempt + 1 >= policy.max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt + 1,
                last: err,
            });
        }

        let delay = policy.backoff(attempt);
        warn!(
            what,
            attempt = attempt + 1,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
