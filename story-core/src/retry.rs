//! Exponential backoff for throttled completion calls.
//!
//! Only errors that report themselves as throttling are retried. Anything
//! else ends the call chain immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Errors that can tell a rate limit apart from a hard failure.
pub trait Throttled {
    fn is_throttled(&self) -> bool;
}

/// How hard to retry a throttled call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base time unit; attempt `n` waits `2^n` units.
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, unit: Duration) -> Self {
        Self { max_attempts, unit }
    }

    /// Wait after the `attempt`-th (0-based) throttled attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Why a guarded call gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("Still rate limited after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    #[error("{0}")]
    Fatal(#[source] E),
}

impl<E> RetryError<E> {
    /// Whether the call gave up because of throttling rather than a hard error.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The error from the last attempt.
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Fatal(e) => e,
        }
    }
}

/// Run `operation`, sleeping `2^attempt` units after each throttled attempt,
/// for at most `policy.max_attempts` attempts.
pub async fn with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Throttled + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_throttled() => {
                attempt += 1;
                if attempt >= max_attempts {
                    warn!(attempts = attempt, error = %e, "Rate limit persisted; giving up");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                let delay = policy.delay_for(attempt - 1);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limit reached; backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(RetryError::Fatal(e)),
        }
    }
}
