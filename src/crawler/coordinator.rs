//! Crawl coordination
//!
//! One coordinator run walks the configured seeds through discovery, drops
//! in-batch duplicates, filters out listings fetched recently enough to
//! still be fresh, then fetches the remainder concurrently with per-target
//! retry. Each target runs in its own task so one failure or panic cannot
//! take down the batch.

use crate::crawler::backend::{FetchErrorKind, FetchOutcome};
use crate::crawler::freshness::FreshnessIndex;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::router::BackendRouter;
use crate::crawler::stats::RunStatistics;
use crate::extract::{extract, ListingFields};
use crate::source::{CrawlTarget, ItemIdentity, SearchSeed};
use crate::store::ListingRecord;
use crate::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub struct CrawlCoordinator {
    router: Arc<BackendRouter>,
    freshness: FreshnessIndex,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

/// One permanently failed target with its final classification
#[derive(Debug)]
pub struct FailedTarget {
    pub target: CrawlTarget,
    pub error: FetchErrorKind,
    pub attempts: u32,
}

/// Everything one coordinator run produced
#[derive(Debug)]
pub struct CrawlReport {
    pub records: Vec<ListingRecord>,
    pub failures: Vec<FailedTarget>,
    pub stats: RunStatistics,
}

enum TaskResult {
    Fetched {
        identity: ItemIdentity,
        outcome: FetchOutcome,
        fields: ListingFields,
    },
    Failed(FetchOutcome),
    Cancelled,
}

impl CrawlCoordinator {
    pub fn new(
        router: Arc<BackendRouter>,
        freshness: FreshnessIndex,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            router,
            freshness,
            retry,
            cancel,
        }
    }

    /// Runs one crawl over the given seeds
    ///
    /// Discovery is sequential per seed; fetching is concurrent, bounded by
    /// each backend's own limiter. Routing failure is fatal; everything
    /// else lands in the report.
    pub async fn run(
        &self,
        seeds: &[SearchSeed],
        freshness_window: Duration,
    ) -> Result<CrawlReport> {
        let start = Instant::now();
        let mut stats = RunStatistics::default();

        let targets = self.discover(seeds, &mut stats).await?;
        let due = self.filter_fresh(targets, freshness_window, &mut stats)?;

        tracing::info!(
            discovered = stats.discovered,
            deduplicated = stats.deduplicated,
            skipped_fresh = stats.skipped_fresh,
            due = due.len(),
            "Discovery complete"
        );

        let mut tasks = JoinSet::new();
        for (target, identity) in due {
            let backend = self.router.route(target.source)?;
            let retry = self.retry;
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                if cancel.is_cancelled() {
                    return TaskResult::Cancelled;
                }

                let outcome = retry.execute(&cancel, || backend.fetch(&target)).await;

                if outcome.cancelled {
                    return TaskResult::Cancelled;
                }

                let Some(payload) = outcome.payload.as_deref() else {
                    return TaskResult::Failed(outcome);
                };

                match extract(payload, outcome.target.source) {
                    Ok(fields) => TaskResult::Fetched {
                        identity,
                        outcome,
                        fields,
                    },
                    Err(_) => {
                        let mut outcome = outcome;
                        outcome.payload = None;
                        outcome.error = Some(FetchErrorKind::ExtractionFailure);
                        TaskResult::Failed(outcome)
                    }
                }
            });
        }

        let mut records = Vec::new();
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let task_result = match joined {
                Ok(task_result) => task_result,
                Err(e) => {
                    // Task isolation: a panicked target is logged and the
                    // rest of the batch carries on
                    tracing::error!(error = %e, "Fetch task panicked");
                    continue;
                }
            };

            match task_result {
                TaskResult::Fetched {
                    identity,
                    outcome,
                    fields,
                } => {
                    let fetched_at = Utc::now();
                    self.freshness.record_success(&identity, fetched_at)?;
                    stats.record_outcome(&outcome);

                    records.push(ListingRecord {
                        uid: identity.uid(),
                        source: identity.source,
                        url: outcome.target.locator.to_string(),
                        title: fields.title,
                        price_text: fields.price_text,
                        price_pence: fields.price_pence,
                        bedrooms: fields.bedrooms,
                        property_type: fields.property_type,
                        address: fields.address,
                        postcode: fields.postcode,
                        backend: outcome.backend,
                        fetched_at,
                    });
                }
                TaskResult::Failed(outcome) => {
                    stats.record_outcome(&outcome);
                    // record_outcome only sees failures with an error set
                    let error = outcome.error.unwrap_or(FetchErrorKind::ExtractionFailure);
                    tracing::warn!(
                        target = %outcome.target.locator,
                        error = %error,
                        attempts = outcome.attempts,
                        "Target failed permanently"
                    );
                    failures.push(FailedTarget {
                        target: outcome.target,
                        error,
                        attempts: outcome.attempts,
                    });
                }
                TaskResult::Cancelled => stats.record_cancelled(),
            }
        }

        stats.elapsed = start.elapsed();
        tracing::info!(
            fetched = stats.fetched,
            failed = stats.failed,
            cancelled = stats.cancelled,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Crawl finished"
        );

        Ok(CrawlReport {
            records,
            failures,
            stats,
        })
    }

    /// Walks each seed sequentially and collects its listing targets
    async fn discover(
        &self,
        seeds: &[SearchSeed],
        stats: &mut RunStatistics,
    ) -> Result<Vec<CrawlTarget>> {
        let mut targets = Vec::new();

        for seed in seeds {
            let backend = self.router.route(seed.source)?;
            let found = backend.discover(seed).await;
            stats.discovered += found.len() as u64;
            targets.extend(found);
        }

        Ok(targets)
    }

    /// Drops in-batch duplicates and targets whose record is still fresh
    fn filter_fresh(
        &self,
        targets: Vec<CrawlTarget>,
        window: Duration,
        stats: &mut RunStatistics,
    ) -> Result<Vec<(CrawlTarget, ItemIdentity)>> {
        let now = Utc::now();
        let mut seen = HashSet::new();
        let mut due = Vec::new();

        for target in targets {
            // Discovery only emits targets matching a listing pattern, so
            // this is unreachable for discovered targets; counted anyway so
            // `discovered` always reconciles with the other counters
            let Some(identity) = ItemIdentity::from_target(&target) else {
                stats.no_identity += 1;
                tracing::debug!(locator = %target.locator, "No identity for target, skipping");
                continue;
            };

            if !seen.insert(identity.clone()) {
                stats.deduplicated += 1;
                continue;
            }

            if !self.freshness.should_fetch(&identity, window, now)? {
                stats.skipped_fresh += 1;
                tracing::debug!(uid = %identity, "Still fresh, skipping");
                continue;
            }

            due.push((target, identity));
        }

        Ok(due)
    }
}
