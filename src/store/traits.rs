//! Listing store trait and record types

use crate::crawler::BackendKind;
use crate::source::{ItemIdentity, SourceId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid stored timestamp: {0}")]
    Timestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A normalized listing as persisted and exported
#[derive(Debug, Clone, Serialize)]
pub struct ListingRecord {
    pub uid: String,
    pub source: SourceId,
    pub url: String,
    pub title: Option<String>,
    pub price_text: Option<String>,
    /// Monthly rent in pence, parsed from the price text
    pub price_pence: Option<i64>,
    pub bedrooms: Option<u32>,
    pub property_type: Option<String>,
    pub address: Option<String>,
    pub postcode: Option<String>,
    pub backend: BackendKind,
    pub fetched_at: DateTime<Utc>,
}

/// Freshness-relevant state of one stored listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessRecord {
    pub last_fetched_at: DateTime<Utc>,
    /// Stale records are always worth refetching regardless of age
    pub stale: bool,
}

/// Counts reported by the `--stats` mode
#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub total: u64,
    pub active: u64,
    pub by_source: Vec<(String, u64)>,
    pub latest_fetch: Option<DateTime<Utc>>,
}

/// Trait for listing store implementations
pub trait ListingStore {
    /// Reads freshness state for an identity; None when never seen
    fn freshness_of(&self, uid: &str) -> StoreResult<Option<FreshnessRecord>>;

    /// Records a successful fetch for an identity
    ///
    /// Upserts, only ever moving `last_fetched_at` forward and incrementing
    /// `fetch_count`. Never touches the extracted field columns.
    fn record_fetch(&mut self, identity: &ItemIdentity, ts: DateTime<Utc>) -> StoreResult<()>;

    /// Upserts a listing's extracted fields
    ///
    /// Never touches the freshness columns of an existing row.
    fn save_listing(&mut self, record: &ListingRecord) -> StoreResult<()>;

    /// Flags a listing as stale so the next run refetches it
    fn mark_stale(&mut self, uid: &str) -> StoreResult<()>;

    /// Records the start of a crawl run with its config hash
    fn begin_run(&mut self, config_hash: &str) -> StoreResult<i64>;

    /// Marks a run as finished
    fn finish_run(&mut self, run_id: i64) -> StoreResult<()>;

    /// Aggregate counts for reporting
    fn summary(&self) -> StoreResult<StoreSummary>;
}
