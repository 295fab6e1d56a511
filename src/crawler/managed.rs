//! Managed scraping-service backend
//!
//! Delegates fetching to an external scraping service over its JSON API.
//! This backend only shapes the request and unwraps the response; the
//! service handles rendering and bot evasion on its side.

use crate::config::ManagedBackendConfig;
use crate::crawler::backend::{BackendKind, FetchBackend, FetchErrorKind, FetchOutcome};
use crate::crawler::direct::{classify_status, classify_transport};
use crate::crawler::limiter::RateLimiter;
use crate::source::CrawlTarget;
use crate::{ConfigError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How long the service should wait for dynamic content, in milliseconds
const RENDER_WAIT_MS: u64 = 2000;

pub struct ManagedBackend {
    client: Client,
    limiter: RateLimiter,
    endpoint: Url,
    api_key: String,
    cancel: CancellationToken,
}

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: &'a [&'a str],
    #[serde(rename = "waitFor")]
    wait_for: u64,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    success: bool,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ManagedBackend {
    pub fn new(
        client: Client,
        config: &ManagedBackendConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid managed endpoint '{}': {}", config.endpoint, e))
        })?;

        Ok(Self {
            client,
            limiter: RateLimiter::from_config(&config.limits)?,
            endpoint,
            api_key: config.api_key.clone(),
            cancel,
        })
    }
}

#[async_trait]
impl FetchBackend for ManagedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Managed
    }

    async fn fetch(&self, target: &CrawlTarget) -> FetchOutcome {
        // Same cancellation boundary as the direct backend: abort while
        // queued on the limiter, finish once the request is in flight
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!(target = %target.locator, "Cancelled while waiting for a permit");
                return FetchOutcome::cancelled(target.clone(), self.kind());
            }
            permit = self.limiter.acquire() => permit,
        };
        let start = Instant::now();

        let request = ScrapeRequest {
            url: target.locator.as_str(),
            formats: &["html"],
            wait_for: RENDER_WAIT_MS,
        };

        let response = match self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let kind = classify_transport(&e);
                tracing::debug!(target = %target.locator, error = %e, "Managed fetch failed");
                return FetchOutcome::failure(target.clone(), self.kind(), kind, start.elapsed());
            }
        };

        if let Some(kind) = classify_status(response.status()) {
            return FetchOutcome::failure(target.clone(), self.kind(), kind, start.elapsed());
        }

        let scrape: ScrapeResponse = match response.json().await {
            Ok(scrape) => scrape,
            Err(e) => {
                let kind = classify_transport(&e);
                return FetchOutcome::failure(target.clone(), self.kind(), kind, start.elapsed());
            }
        };

        match (scrape.success, scrape.html) {
            (true, Some(html)) => {
                FetchOutcome::success(target.clone(), self.kind(), html, start.elapsed())
            }
            _ => {
                tracing::debug!(
                    target = %target.locator,
                    error = scrape.error.as_deref().unwrap_or("no html in response"),
                    "Scrape service reported failure"
                );
                FetchOutcome::failure(
                    target.clone(),
                    self.kind(),
                    FetchErrorKind::Blocked,
                    start.elapsed(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_request_shape() {
        let request = ScrapeRequest {
            url: "https://rightmove.co.uk/properties/1",
            formats: &["html"],
            wait_for: RENDER_WAIT_MS,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["url"], "https://rightmove.co.uk/properties/1");
        assert_eq!(json["formats"][0], "html");
        assert_eq!(json["waitFor"], 2000);
    }

    #[test]
    fn test_scrape_response_success() {
        let scrape: ScrapeResponse =
            serde_json::from_str(r#"{"success": true, "html": "<html></html>"}"#).unwrap();
        assert!(scrape.success);
        assert_eq!(scrape.html.as_deref(), Some("<html></html>"));
    }

    #[test]
    fn test_scrape_response_failure_without_html() {
        let scrape: ScrapeResponse =
            serde_json::from_str(r#"{"success": false, "error": "rendering failed"}"#).unwrap();
        assert!(!scrape.success);
        assert!(scrape.html.is_none());
        assert_eq!(scrape.error.as_deref(), Some("rendering failed"));
    }
}
