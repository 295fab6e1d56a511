//! Bounded retry with exponential backoff
//!
//! Only transient failures are retried. Backoff doubles from the base delay
//! on each retry, and cancellation stops further attempts without tearing
//! down the one in flight.

use crate::config::RetryConfig;
use crate::crawler::backend::{FetchErrorKind, FetchOutcome};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.base_delay_ms))
    }

    /// Delay before the retry following `attempts_made` completed attempts
    fn backoff_delay(&self, attempts_made: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempts_made.saturating_sub(1))
    }

    /// Runs `attempt` until it succeeds, fails permanently, is cancelled,
    /// or the retry budget runs out
    ///
    /// The returned outcome carries the total attempt count. When the
    /// budget runs out on a transient failure the error kind becomes
    /// `RetriesExhausted` with `attempts == max_retries + 1`. Cancellation
    /// during backoff returns the last outcome as-is; an attempt the
    /// backend abandoned before issuing a request comes back with the
    /// cancelled marker and is never retried.
    pub async fn execute<F, Fut>(&self, cancel: &CancellationToken, mut attempt: F) -> FetchOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        let mut attempts_made = 0u32;

        loop {
            let mut outcome = attempt().await;
            if outcome.cancelled {
                return outcome;
            }
            attempts_made += 1;
            outcome.attempts = attempts_made;

            let Some(kind) = outcome.error else {
                return outcome;
            };

            if !kind.is_retryable() {
                return outcome;
            }

            if attempts_made > self.max_retries {
                outcome.error = Some(FetchErrorKind::RetriesExhausted);
                return outcome;
            }

            if cancel.is_cancelled() {
                return outcome;
            }

            let delay = self.backoff_delay(attempts_made);
            tracing::debug!(
                target = %outcome.target.locator,
                attempt = attempts_made,
                error = %kind,
                delay_ms = delay.as_millis() as u64,
                "Transient fetch failure, backing off"
            );

            tokio::select! {
                _ = cancel.cancelled() => return outcome,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
