use crate::crawler::BackendKind;
use crate::source::{SearchSeed, SourceId};
use crate::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

/// Main configuration structure for flathunt
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    pub backends: BackendsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Which backend serves each source
    pub routing: HashMap<SourceId, BackendKind>,
    #[serde(rename = "user-agent")]
    pub user_agent: String,
    pub output: OutputConfig,
}

/// Search and discovery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// How long a previously fetched listing stays fresh (hours). Zero
    /// disables freshness skipping entirely.
    #[serde(
        rename = "freshness-window-hours",
        default = "default_freshness_window_hours"
    )]
    pub freshness_window_hours: u64,

    /// Maximum search-result pages to walk per seed
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Search-result URLs to discover listings from
    pub seeds: Vec<SeedEntry>,
}

/// One search seed: a results-page URL belonging to a source
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub source: SourceId,
    pub url: String,
}

/// Per-backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendsConfig {
    #[serde(default)]
    pub managed: Option<ManagedBackendConfig>,
    #[serde(default)]
    pub direct: Option<DirectBackendConfig>,
}

/// Managed scraping-service backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ManagedBackendConfig {
    /// Scrape endpoint of the service (e.g. "https://api.example.com/v1/scrape")
    pub endpoint: String,

    #[serde(rename = "api-key")]
    pub api_key: String,

    #[serde(flatten)]
    pub limits: RateLimitConfig,
}

/// Direct HTTP backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DirectBackendConfig {
    /// Bodies smaller than this are treated as bot-wall interstitials
    #[serde(rename = "min-payload-bytes", default = "default_min_payload_bytes")]
    pub min_payload_bytes: usize,

    #[serde(flatten)]
    pub limits: RateLimitConfig,
}

/// Sliding-window rate limit parameters for one backend
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests started within any window
    #[serde(rename = "max-requests")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(rename = "window-secs")]
    pub window_secs: u64,

    /// Maximum requests in flight at once
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: u32,
}

/// Retry behavior for transient fetch failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds; doubles on each retry
    #[serde(rename = "base-delay-ms", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_freshness_window_hours() -> u64 {
    24
}

fn default_max_pages() -> u32 {
    5
}

fn default_min_payload_bytes() -> usize {
    2048
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Config {
    /// Parses the configured seeds into crawlable search seeds
    ///
    /// Validation has already checked that every URL parses, but this keeps
    /// the error path explicit for callers constructing configs by hand.
    pub fn search_seeds(&self) -> Result<Vec<SearchSeed>, ConfigError> {
        self.search
            .seeds
            .iter()
            .map(|entry| {
                let url = Url::parse(&entry.url).map_err(|e| {
                    ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", entry.url, e))
                })?;
                Ok(SearchSeed {
                    source: entry.source,
                    url,
                    max_pages: self.search.max_pages,
                })
            })
            .collect()
    }
}
