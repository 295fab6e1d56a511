//! Flathunt: a rental-listing crawl coordinator
//!
//! This crate discovers listing URLs from portal search pages, fetches them
//! through per-source backends (a managed scraping service or plain HTTP),
//! skips listings fetched recently enough to still be fresh, and returns
//! normalized records with per-run statistics.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod source;
pub mod store;

use thiserror::Error;

/// Main error type for flathunt operations
#[derive(Debug, Error)]
pub enum FlathuntError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // The field is not named `source` because thiserror would treat it as
    // the error's cause and require SourceId: std::error::Error
    #[error("No backend is routed for source '{source_id}'")]
    UnroutableSource { source_id: source::SourceId },

    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(String),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Locator-specific errors
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("Failed to parse locator: {0}")]
    Parse(String),

    #[error("Invalid locator scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in locator")]
    MissingHost,
}

/// Result type alias for flathunt operations
pub type Result<T> = std::result::Result<T, FlathuntError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlCoordinator, CrawlReport, FetchOutcome, RunStatistics};
pub use source::{CrawlTarget, ItemIdentity, SearchSeed, SourceId};
