//! SQLite listing store implementation

use crate::source::ItemIdentity;
use crate::store::schema::initialize_schema;
use crate::store::traits::{
    FreshnessRecord, ListingRecord, ListingStore, StoreError, StoreResult, StoreSummary,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite-backed listing store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn parse_timestamp(text: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Timestamp(format!("'{}': {}", text, e)))
}

impl ListingStore for SqliteStore {
    fn freshness_of(&self, uid: &str) -> StoreResult<Option<FreshnessRecord>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT last_fetched_at, status FROM listings WHERE uid = ?1",
                params![uid],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((last_fetched_at, status)) => Ok(Some(FreshnessRecord {
                last_fetched_at: parse_timestamp(&last_fetched_at)?,
                stale: status != "active",
            })),
        }
    }

    fn record_fetch(&mut self, identity: &ItemIdentity, ts: DateTime<Utc>) -> StoreResult<()> {
        let ts = ts.to_rfc3339();
        // RFC 3339 timestamps in UTC compare correctly as text
        self.conn.execute(
            "INSERT INTO listings (uid, source, first_seen, last_fetched_at, fetch_count, status)
             VALUES (?1, ?2, ?3, ?3, 1, 'active')
             ON CONFLICT(uid) DO UPDATE SET
                 last_fetched_at = MAX(last_fetched_at, excluded.last_fetched_at),
                 fetch_count = fetch_count + 1,
                 status = 'active'",
            params![identity.uid(), identity.source.as_str(), ts],
        )?;
        Ok(())
    }

    fn save_listing(&mut self, record: &ListingRecord) -> StoreResult<()> {
        let fetched_at = record.fetched_at.to_rfc3339();
        self.conn.execute(
            "INSERT INTO listings (uid, source, url, title, price_text, price_pence, bedrooms,
                                   property_type, address, postcode, backend,
                                   first_seen, last_fetched_at, fetch_count, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12, 0, 'active')
             ON CONFLICT(uid) DO UPDATE SET
                 url = excluded.url,
                 title = excluded.title,
                 price_text = excluded.price_text,
                 price_pence = excluded.price_pence,
                 bedrooms = excluded.bedrooms,
                 property_type = excluded.property_type,
                 address = excluded.address,
                 postcode = excluded.postcode,
                 backend = excluded.backend",
            params![
                record.uid,
                record.source.as_str(),
                record.url,
                record.title,
                record.price_text,
                record.price_pence,
                record.bedrooms,
                record.property_type,
                record.address,
                record.postcode,
                record.backend.as_str(),
                fetched_at,
            ],
        )?;
        Ok(())
    }

    fn mark_stale(&mut self, uid: &str) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE listings SET status = 'inactive' WHERE uid = ?1",
            params![uid],
        )?;
        Ok(())
    }

    fn begin_run(&mut self, config_hash: &str) -> StoreResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash) VALUES (?1, ?2)",
            params![now, config_hash],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET finished_at = ?1 WHERE id = ?2",
            params![now, run_id],
        )?;
        Ok(())
    }

    fn summary(&self) -> StoreResult<StoreSummary> {
        let total: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;

        let active: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM listings WHERE status = 'active'",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT source, COUNT(*) FROM listings GROUP BY source ORDER BY source")?;
        let by_source = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, u64)>, _>>()?;

        let latest: Option<String> = self
            .conn
            .query_row("SELECT MAX(last_fetched_at) FROM listings", [], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();

        let latest_fetch = match latest {
            Some(text) => Some(parse_timestamp(&text)?),
            None => None,
        };

        Ok(StoreSummary {
            total,
            active,
            by_source,
            latest_fetch,
        })
    }
}
