//! Freshness filtering over the listing store
//!
//! Decides whether a listing is due another fetch. Reads and writes go
//! through the shared store; this type adds only the window arithmetic.

use crate::source::ItemIdentity;
use crate::store::{SharedStore, StoreResult};
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Clone)]
pub struct FreshnessIndex {
    store: SharedStore,
}

impl FreshnessIndex {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// True when the identity is due a fetch at `now`
    ///
    /// Unknown identities and stale-flagged records are always due. A zero
    /// window disables freshness skipping entirely.
    pub fn should_fetch(
        &self,
        identity: &ItemIdentity,
        window: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        if window.is_zero() {
            return Ok(true);
        }

        let record = self.store.lock().unwrap().freshness_of(&identity.uid())?;

        match record {
            None => Ok(true),
            Some(record) if record.stale => Ok(true),
            Some(record) => {
                let window =
                    chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
                Ok(now - record.last_fetched_at >= window)
            }
        }
    }

    /// Records a successful fetch, moving `last_fetched_at` forward only
    pub fn record_success(&self, identity: &ItemIdentity, ts: DateTime<Utc>) -> StoreResult<()> {
        self.store.lock().unwrap().record_fetch(identity, ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceId;
    use crate::store::{shared, SqliteStore};

    fn index() -> FreshnessIndex {
        FreshnessIndex::new(shared(SqliteStore::in_memory().unwrap()))
    }

    fn identity() -> ItemIdentity {
        ItemIdentity {
            source: SourceId::Rightmove,
            external_id: "1".to_string(),
        }
    }

    #[test]
    fn test_unknown_identity_is_due() {
        let index = index();
        let due = index
            .should_fetch(&identity(), Duration::from_secs(3600), Utc::now())
            .unwrap();
        assert!(due);
    }

    #[test]
    fn test_recent_fetch_is_not_due() {
        let index = index();
        let now = Utc::now();
        index.record_success(&identity(), now).unwrap();

        let due = index
            .should_fetch(&identity(), Duration::from_secs(24 * 3600), now)
            .unwrap();
        assert!(!due);
    }

    #[test]
    fn test_due_once_window_has_passed() {
        let index = index();
        let fetched = Utc::now();
        index.record_success(&identity(), fetched).unwrap();

        let later = fetched + chrono::Duration::hours(24);
        let due = index
            .should_fetch(&identity(), Duration::from_secs(24 * 3600), later)
            .unwrap();
        assert!(due);
    }

    #[test]
    fn test_boundary_is_due() {
        // `now - last == window` counts as due
        let index = index();
        let fetched = Utc::now();
        index.record_success(&identity(), fetched).unwrap();

        let exactly = fetched + chrono::Duration::seconds(60);
        let due = index
            .should_fetch(&identity(), Duration::from_secs(60), exactly)
            .unwrap();
        assert!(due);
    }

    #[test]
    fn test_zero_window_always_due() {
        let index = index();
        let now = Utc::now();
        index.record_success(&identity(), now).unwrap();

        let due = index.should_fetch(&identity(), Duration::ZERO, now).unwrap();
        assert!(due);
    }

    #[test]
    fn test_stale_record_always_due() {
        let store = shared(SqliteStore::in_memory().unwrap());
        let index = FreshnessIndex::new(store.clone());
        let now = Utc::now();

        index.record_success(&identity(), now).unwrap();
        store.lock().unwrap().mark_stale(&identity().uid()).unwrap();

        let due = index
            .should_fetch(&identity(), Duration::from_secs(24 * 3600), now)
            .unwrap();
        assert!(due);
    }
}
