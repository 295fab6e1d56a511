//! Per-run crawl statistics

use crate::crawler::backend::{BackendKind, FetchErrorKind, FetchOutcome};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Counters accumulated over one coordinator run
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunStatistics {
    /// Listing targets found during discovery, before dedup
    pub discovered: u64,

    /// Targets dropped as in-batch duplicates
    pub deduplicated: u64,

    /// Targets dropped because no listing identity could be derived from
    /// their locator
    pub no_identity: u64,

    /// Targets skipped because their record was still fresh
    pub skipped_fresh: u64,

    /// Fetch attempts made through the managed backend, retries included
    pub attempts_managed: u64,

    /// Fetch attempts made through the direct backend, retries included
    pub attempts_direct: u64,

    /// Targets fetched and extracted successfully
    pub fetched: u64,

    /// Targets that failed permanently
    pub failed: u64,

    /// Targets abandoned by cancellation before their first attempt
    pub cancelled: u64,

    /// Permanent failures broken down by error kind
    pub failures_by_kind: HashMap<FetchErrorKind, u64>,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunStatistics {
    /// Folds one finished fetch outcome into the counters
    pub fn record_outcome(&mut self, outcome: &FetchOutcome) {
        match outcome.backend {
            BackendKind::Managed => self.attempts_managed += outcome.attempts as u64,
            BackendKind::Direct => self.attempts_direct += outcome.attempts as u64,
        }

        match outcome.error {
            None => self.fetched += 1,
            Some(kind) => {
                self.failed += 1;
                *self.failures_by_kind.entry(kind).or_insert(0) += 1;
            }
        }
    }

    pub fn record_cancelled(&mut self) {
        self.cancelled += 1;
    }

    pub fn total_attempts(&self) -> u64 {
        self.attempts_managed + self.attempts_direct
    }
}
