//! Bounded retry with a fixed delay.
//!
//! Any error from the wrapped operation triggers another attempt until the
//! retry budget is spent. There is no backoff and no jitter, and the caller
//! decides what counts as an error: for the forecast fetch that is only a
//! transport failure, never an HTTP status.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::constants::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS};

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one fails
    pub max_retries: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Result of the final attempt together with how many attempts were made.
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub attempts: u32,
    pub result: Result<T, E>,
}

/// Runs `operation` until it succeeds or `policy.max_retries` retries have
/// failed. The last attempt's result is returned as is; earlier failures are
/// only logged.
pub async fn with_retry<F, Fut, T, E>(policy: RetryPolicy, mut operation: F) -> Attempted<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 1;
    loop {
        let result = operation().await;
        match result {
            Err(e) if attempt < policy.max_attempts() => {
                tracing::warn!(
                    "Attempt {} of {} failed: {}; retrying in {:?}",
                    attempt,
                    policy.max_attempts(),
                    e,
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            result => {
                if result.is_ok() && attempt > 1 {
                    tracing::info!("Request succeeded after {} attempts", attempt);
                }
                return Attempted {
                    attempts: attempt,
                    result,
                };
            }
        }
    }
}
