//! # Retry Policy
//!
//! Bounded exponential backoff around a fallible async operation. Errors
//! that classify themselves as permanent stop the loop immediately, and a
//! cancelled token ends the loop before the next attempt or mid-backoff.

use crate::config::PubSubConfig;
use crate::pubsub::errors::BulkDispatchError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Classifies errors for the retry loop
pub trait Retryable: Sized {
    /// Permanent errors are returned without another attempt
    fn is_permanent(&self) -> bool;

    /// Error returned when the caller cancels the operation
    fn cancelled() -> Self;
}

impl Retryable for BulkDispatchError {
    fn is_permanent(&self) -> bool {
        BulkDispatchError::is_permanent(self)
    }

    fn cancelled() -> Self {
        BulkDispatchError::Cancelled
    }
}

/// Backoff settings for retried operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one; 0 disables retrying
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PubSubConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            backoff_multiplier: config.backoff_multiplier,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Delay before retry number `retry` (1-based), capped at `max_backoff`
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let delay = self.initial_backoff.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(delay)
        }
    }

    /// Runs `operation` until it succeeds, fails permanently or the retry
    /// budget is spent; the last error is returned. Once `cancel` fires no
    /// further attempt is made and `E::cancelled()` is returned.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation_name: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retry = 0;
        loop {
            if cancel.is_cancelled() {
                debug!(operation = %operation_name, retries = retry, "Operation cancelled before attempt");
                return Err(E::cancelled());
            }
            match operation().await {
                Ok(value) => {
                    if retry > 0 {
                        debug!(operation = %operation_name, retries = retry, "✅ Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_permanent() => return Err(e),
                Err(e) if retry >= self.max_retries => return Err(e),
                Err(e) => {
                    retry += 1;
                    let delay = self.backoff_for(retry);
                    warn!(
                        operation = %operation_name,
                        retry = retry,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "🔄 Retrying operation"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!(operation = %operation_name, retries = retry, "Operation cancelled during backoff");
                            return Err(E::cancelled());
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
