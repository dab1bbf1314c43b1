//! Exponential backoff around a fallible async operation.
//!
//! [`with_backoff`] runs the operation up to `max_retries + 1` times. Between
//! attempts it sleeps `base_delay_ms * 2^attempt_index` plus up to
//! `jitter_ms` of random jitter. Errors whose [`Retryable::is_retryable`]
//! returns `false` are surfaced immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Classifies an error as transient (worth another attempt) or terminal.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry budget for one kind of remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds, doubled on every retry.
    pub base_delay_ms: u64,
    /// Upper bound of the random jitter added to each delay.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            jitter_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows attempt `attempt_index` (0-based),
    /// without jitter: `base_delay_ms * 2^attempt_index`.
    pub fn delay_for_attempt(&self, attempt_index: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt_index);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    fn jittered_delay(&self, attempt_index: u32) -> Duration {
        let base = self.delay_for_attempt(attempt_index);
        if self.jitter_ms == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..=self.jitter_ms);
        base + Duration::from_millis(jitter)
    }
}

/// Run `operation` under `policy`, returning the first success or the last error.
pub async fn with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.jittered_delay(attempt);
                attempt += 1;
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(error = %e, attempts = attempt + 1, "retries exhausted");
                } else {
                    tracing::warn!(error = %e, "non-retryable failure");
                }
                return Err(e);
            }
        }
    }
}
