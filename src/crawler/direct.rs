//! Direct HTTP fetch backend
//!
//! Fetches listing pages with a plain GET. The portals answer bot traffic
//! with interstitial pages well under the size of a real listing, so an
//! undersized body counts as blocked rather than success.

use crate::config::DirectBackendConfig;
use crate::crawler::backend::{BackendKind, FetchBackend, FetchErrorKind, FetchOutcome};
use crate::crawler::limiter::RateLimiter;
use crate::source::CrawlTarget;
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct DirectBackend {
    client: Client,
    limiter: RateLimiter,
    min_payload_bytes: usize,
    cancel: CancellationToken,
}

impl DirectBackend {
    pub fn new(
        client: Client,
        config: &DirectBackendConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            client,
            limiter: RateLimiter::from_config(&config.limits)?,
            min_payload_bytes: config.min_payload_bytes,
            cancel,
        })
    }
}

#[async_trait]
impl FetchBackend for DirectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Direct
    }

    async fn fetch(&self, target: &CrawlTarget) -> FetchOutcome {
        // A fetch queued on the limiter has not started its request, so
        // cancellation aborts the wait; once the permit is held the request
        // runs to completion
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!(target = %target.locator, "Cancelled while waiting for a permit");
                return FetchOutcome::cancelled(target.clone(), self.kind());
            }
            permit = self.limiter.acquire() => permit,
        };
        let start = Instant::now();

        let response = match self.client.get(target.locator.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = classify_transport(&e);
                tracing::debug!(target = %target.locator, error = %e, "Direct fetch failed");
                return FetchOutcome::failure(target.clone(), self.kind(), kind, start.elapsed());
            }
        };

        if let Some(kind) = classify_status(response.status()) {
            return FetchOutcome::failure(target.clone(), self.kind(), kind, start.elapsed());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let kind = classify_transport(&e);
                return FetchOutcome::failure(target.clone(), self.kind(), kind, start.elapsed());
            }
        };

        if body.len() < self.min_payload_bytes {
            tracing::debug!(
                target = %target.locator,
                bytes = body.len(),
                "Undersized body, treating as bot wall"
            );
            return FetchOutcome::failure(
                target.clone(),
                self.kind(),
                FetchErrorKind::Blocked,
                start.elapsed(),
            );
        }

        FetchOutcome::success(target.clone(), self.kind(), body, start.elapsed())
    }
}

/// Maps an HTTP status to a fetch error kind; None means success
pub(crate) fn classify_status(status: StatusCode) -> Option<FetchErrorKind> {
    if status.is_success() {
        return None;
    }

    Some(match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FetchErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => FetchErrorKind::RateLimited,
        s if s.is_server_error() => FetchErrorKind::ConnectionError,
        _ => FetchErrorKind::Blocked,
    })
}

/// Maps a reqwest transport error to a fetch error kind
pub(crate) fn classify_transport(e: &reqwest::Error) -> FetchErrorKind {
    if e.is_timeout() {
        FetchErrorKind::Timeout
    } else {
        FetchErrorKind::ConnectionError
    }
}
