//! Sliding-window rate limiting with a concurrency cap
//!
//! Each backend owns one limiter. A request may start only when both
//! constraints allow: fewer than `max_requests` starts within the trailing
//! window, and fewer than `max_concurrent` requests in flight.

use crate::config::RateLimitConfig;
use crate::FlathuntError;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Combined sliding-window and concurrency limiter
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    semaphore: Arc<Semaphore>,
    /// Start times of requests within the trailing window, oldest first
    timestamps: Mutex<VecDeque<Instant>>,
}

/// Proof that a request may start now
///
/// Dropping the permit releases the concurrency slot on every exit path.
/// The window timestamp recorded at acquisition stays recorded regardless
/// of how the request turns out.
pub struct RatePermit {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    pub fn new(
        max_requests: u32,
        window: Duration,
        max_concurrent: u32,
    ) -> Result<Self, FlathuntError> {
        if max_requests == 0 {
            return Err(FlathuntError::InvalidRateLimit(
                "max_requests must be >= 1".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(FlathuntError::InvalidRateLimit(
                "window must be non-zero".to_string(),
            ));
        }
        if max_concurrent == 0 {
            return Err(FlathuntError::InvalidRateLimit(
                "max_concurrent must be >= 1".to_string(),
            ));
        }

        Ok(Self {
            max_requests: max_requests as usize,
            window,
            semaphore: Arc::new(Semaphore::new(max_concurrent as usize)),
            timestamps: Mutex::new(VecDeque::new()),
        })
    }

    pub fn from_config(limits: &RateLimitConfig) -> Result<Self, FlathuntError> {
        Self::new(
            limits.max_requests,
            Duration::from_secs(limits.window_secs),
            limits.max_concurrent,
        )
    }

    /// Suspends until both constraints allow a request to start
    ///
    /// Records the request's start timestamp before returning, so the
    /// window budget is consumed whether or not the request succeeds.
    pub async fn acquire(&self) -> RatePermit {
        // The semaphore lives as long as the limiter and is never closed
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");

        loop {
            let wait = {
                let mut stamps = self.timestamps.lock().await;
                let now = Instant::now();

                while let Some(oldest) = stamps.front() {
                    if now.duration_since(*oldest) >= self.window {
                        stamps.pop_front();
                    } else {
                        break;
                    }
                }

                if stamps.len() < self.max_requests {
                    stamps.push_back(now);
                    None
                } else {
                    // Budget exhausted; the oldest in-window start decides
                    // when a slot opens
                    Some(self.window - now.duration_since(stamps[0]))
                }
            };

            match wait {
                None => return RatePermit { _permit: permit },
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}
