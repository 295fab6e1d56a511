//! Fetch backend trait and the shared fetch outcome types
//!
//! A backend turns a crawl target into a payload. Fetching never errors at
//! the call boundary; failure is part of the outcome, so one slow or blocked
//! target cannot take down its siblings.

use crate::source::{pagination_urls, CrawlTarget, SearchSeed, SourceId};
use crate::source::{listing_id, normalize_locator};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Which backend implementation served a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// External scraping service speaking JSON
    Managed,
    /// Plain HTTP GET
    Direct,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified fetch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FetchErrorKind {
    /// The request exceeded its deadline
    Timeout,
    /// Connection refused, reset, or otherwise failed below HTTP
    ConnectionError,
    /// The remote side told us to slow down (HTTP 429)
    RateLimited,
    /// Bot wall or access denial; retrying won't help
    Blocked,
    /// The listing is gone (HTTP 404/410)
    NotFound,
    /// Payload arrived but yielded no usable fields
    ExtractionFailure,
    /// Transient failures persisted through every allowed attempt
    RetriesExhausted,
}

impl FetchErrorKind {
    /// Transient failures are worth another attempt; everything else is
    /// permanent for this run
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ConnectionError | Self::RateLimited
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "Timeout",
            Self::ConnectionError => "ConnectionError",
            Self::RateLimited => "RateLimited",
            Self::Blocked => "Blocked",
            Self::NotFound => "NotFound",
            Self::ExtractionFailure => "ExtractionFailure",
            Self::RetriesExhausted => "RetriesExhausted",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of fetching one target, success or failure
#[derive(Debug)]
pub struct FetchOutcome {
    pub target: CrawlTarget,
    /// Response body; present only on success
    pub payload: Option<String>,
    pub backend: BackendKind,
    pub elapsed: Duration,
    /// Attempts made so far, including this one
    pub attempts: u32,
    pub error: Option<FetchErrorKind>,
    /// Set when cancellation arrived before a request was issued. Not an
    /// error kind: nothing was attempted, so there is nothing to classify.
    pub cancelled: bool,
}

impl FetchOutcome {
    pub fn success(
        target: CrawlTarget,
        backend: BackendKind,
        payload: String,
        elapsed: Duration,
    ) -> Self {
        Self {
            target,
            payload: Some(payload),
            backend,
            elapsed,
            attempts: 1,
            error: None,
            cancelled: false,
        }
    }

    pub fn failure(
        target: CrawlTarget,
        backend: BackendKind,
        kind: FetchErrorKind,
        elapsed: Duration,
    ) -> Self {
        Self {
            target,
            payload: None,
            backend,
            elapsed,
            attempts: 1,
            error: Some(kind),
            cancelled: false,
        }
    }

    /// Marks a fetch abandoned before its request went out, typically while
    /// still queued on the backend's rate limiter
    pub fn cancelled(target: CrawlTarget, backend: BackendKind) -> Self {
        Self {
            target,
            payload: None,
            backend,
            elapsed: Duration::ZERO,
            attempts: 0,
            error: None,
            cancelled: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.cancelled
    }
}

/// A way of turning crawl targets into payloads
#[async_trait]
pub trait FetchBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Fetches one target. Acquires the backend's own rate limit permit and
    /// reports failure inside the outcome, never as an Err.
    async fn fetch(&self, target: &CrawlTarget) -> FetchOutcome;

    /// Walks a seed's paginated search results and collects listing targets
    ///
    /// Per-page failures are logged and skipped; one broken results page
    /// does not abort discovery for the seed.
    async fn discover(&self, seed: &SearchSeed) -> Vec<CrawlTarget> {
        let mut targets = Vec::new();
        let mut failed_pages = 0u32;

        for page_url in pagination_urls(seed) {
            let page_target = CrawlTarget::new(seed.source, page_url.clone(), "seed");
            let outcome = self.fetch(&page_target).await;

            if outcome.cancelled {
                tracing::debug!(source = %seed.source, "Discovery cancelled");
                break;
            }

            match outcome.payload {
                Some(html) => {
                    let found = extract_listing_targets(&html, seed.source, &page_url);
                    tracing::debug!(
                        source = %seed.source,
                        page = %page_url,
                        listings = found.len(),
                        "Discovered listings from search page"
                    );
                    targets.extend(found);
                }
                None => {
                    failed_pages += 1;
                    tracing::warn!(
                        source = %seed.source,
                        page = %page_url,
                        error = ?outcome.error,
                        "Search page fetch failed, skipping"
                    );
                }
            }
        }

        if failed_pages > 0 {
            tracing::warn!(
                source = %seed.source,
                failed_pages,
                "Discovery completed with failed pages"
            );
        }

        targets
    }
}

/// Pulls listing URLs out of a search-results page
///
/// Anchors are resolved against the page URL, normalized, and kept only
/// when their path matches the source's listing pattern. Duplicate anchors
/// within one page collapse here; cross-page dedup is the coordinator's job.
pub fn extract_listing_targets(html: &str, source: SourceId, page_url: &Url) -> Vec<CrawlTarget> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    if let Ok(anchor_selector) = Selector::parse("a[href]") {
        for element in document.select(&anchor_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };

            let Ok(resolved) = page_url.join(href) else {
                continue;
            };

            let Ok(locator) = normalize_locator(resolved.as_str()) else {
                continue;
            };

            if listing_id(source, &locator).is_none() {
                continue;
            }

            if seen.insert(locator.clone()) {
                targets.push(CrawlTarget::new(source, locator, page_url.as_str()));
            }
        }
    }

    targets
}
