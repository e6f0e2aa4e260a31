//! Bounded retry with exponential backoff.

use gauge_core::Retryable;
use serde::Deserialize;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How many times to attempt an operation and how long to wait between
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub delay_ms: u64,
    /// Factor applied to the delay after every failed retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay to wait after failed attempt `attempt` (1-based):
    /// `delay_ms * backoff_multiplier^(attempt - 1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let ms = self.delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        if ms.is_finite() && ms > 0.0 {
            Duration::from_millis(ms.min(u64::MAX as f64) as u64)
        } else {
            Duration::ZERO
        }
    }
}

/// Run `operation` under `policy`.
///
/// Non-retryable errors are returned after the first attempt. Once attempts
/// run out the last error is returned unchanged.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    retry_with(policy, operation, |_, _| {}).await
}

/// Like [`retry`], calling `on_retry(attempt, &error)` after each failed
/// attempt that will be retried. `attempt` is the 1-based number of the
/// attempt that just failed.
pub async fn retry_with<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
    R: FnMut(u32, &E),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= max_attempts {
            return Err(err);
        }

        let delay = policy.delay_after(attempt);
        warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "operation failed, retrying"
        );
        on_retry(attempt, &err);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
