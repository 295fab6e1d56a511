//! Crawl machinery
//!
//! Rate limiting, retry, fetch backends, routing, freshness filtering, and
//! the coordinator that ties them together for one run.

mod backend;
mod coordinator;
mod direct;
mod freshness;
mod limiter;
mod managed;
mod retry;
mod router;
mod stats;

pub use backend::{extract_listing_targets, BackendKind, FetchBackend, FetchErrorKind, FetchOutcome};
pub use coordinator::{CrawlCoordinator, CrawlReport, FailedTarget};
pub use direct::DirectBackend;
pub use freshness::FreshnessIndex;
pub use limiter::{RateLimiter, RatePermit};
pub use managed::ManagedBackend;
pub use retry::RetryPolicy;
pub use router::BackendRouter;
pub use stats::RunStatistics;

use crate::config::Config;
use crate::store::SharedStore;
use crate::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Builds the HTTP client both backends share
pub fn build_http_client(user_agent: &str) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

/// Wires a coordinator from config and a shared store
pub fn build_coordinator(
    config: &Config,
    store: SharedStore,
    cancel: CancellationToken,
) -> Result<CrawlCoordinator> {
    let client = build_http_client(&config.user_agent)?;
    let router = Arc::new(BackendRouter::from_config(config, client, &cancel)?);
    let freshness = FreshnessIndex::new(store);
    let retry = RetryPolicy::from_config(&config.retry);

    Ok(CrawlCoordinator::new(router, freshness, retry, cancel))
}
