//! Listing persistence
//!
//! SQLite-backed storage for extracted listings and their freshness state.

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteStore;
pub use traits::{
    FreshnessRecord, ListingRecord, ListingStore, StoreError, StoreResult, StoreSummary,
};

use std::sync::{Arc, Mutex};

/// Shared handle to a listing store
///
/// The coordinator and the freshness index both touch the store from async
/// tasks; a std mutex is fine because no lock is held across an await.
pub type SharedStore = Arc<Mutex<dyn ListingStore + Send>>;

/// Wraps a store for shared use
pub fn shared(store: impl ListingStore + Send + 'static) -> SharedStore {
    Arc::new(Mutex::new(store))
}
