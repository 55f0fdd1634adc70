//! Caller-side retry with exponential backoff.
//!
//! The pipeline itself never retries: a repeated model call is billed again,
//! so only the orchestrating caller can decide it is worth it. This helper
//! is what the `paperlens` binary uses.
//!
//! Only transient failures are retried, as reported by [`Retryable`]:
//! fetch timeouts and network errors, unreachable or rate-limited models.
//! The wait before retry `n` is `base_ms × 2^(n-1)`: with a 500 ms base and
//! 3 retries that is 500 ms → 1 s → 2 s.

use crate::error::{AnalysisError, FetchError, PaperError};
use std::fmt::Display;
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Errors that can tell whether another attempt might succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        FetchError::is_retryable(self)
    }
}

impl Retryable for AnalysisError {
    fn is_retryable(&self) -> bool {
        AnalysisError::is_retryable(self)
    }
}

impl Retryable for PaperError {
    fn is_retryable(&self) -> bool {
        PaperError::is_retryable(self)
    }
}

/// Retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 disables retrying.
    pub max_retries: u32,
    /// Wait before the first retry, in milliseconds.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_ms,
        }
    }

    /// Wait before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget is spent.
///
/// `label` names the operation in log lines.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries && e.is_retryable() => {
                attempt += 1;
                let backoff = policy.backoff_for(attempt);
                warn!(
                    "{}: attempt {} failed ({}); retry {}/{} after {}ms",
                    label,
                    attempt,
                    e,
                    attempt,
                    policy.max_retries,
                    backoff.as_millis()
                );
                sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
