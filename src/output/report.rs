//! Run reporting and record export

use crate::crawler::{CrawlReport, RunStatistics};
use crate::store::{ListingRecord, StoreSummary};
use crate::Result;
use std::path::Path;

/// One-line digest of a run, e.g.
/// `42 discovered, 10 skipped as fresh, 28 fetched, 4 permanently failed: 3 Blocked, 1 ExtractionFailure`
pub fn summary_line(stats: &RunStatistics) -> String {
    let mut line = format!(
        "{} discovered, {} skipped as fresh, {} fetched, {} permanently failed",
        stats.discovered, stats.skipped_fresh, stats.fetched, stats.failed
    );

    if !stats.failures_by_kind.is_empty() {
        let mut kinds: Vec<_> = stats.failures_by_kind.iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        let breakdown = kinds
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind))
            .collect::<Vec<_>>()
            .join(", ");
        line.push_str(&format!(": {}", breakdown));
    }

    line
}

/// Prints the full run report to stdout
pub fn print_run_summary(report: &CrawlReport) {
    let stats = &report.stats;

    println!("=== Crawl Summary ===\n");
    println!("{}", summary_line(stats));
    println!();

    println!("Discovery:");
    println!("  Targets discovered: {}", stats.discovered);
    println!("  In-batch duplicates: {}", stats.deduplicated);
    println!("  Skipped as fresh: {}", stats.skipped_fresh);
    if stats.no_identity > 0 {
        println!("  No listing identity: {}", stats.no_identity);
    }
    println!();

    println!("Fetching:");
    println!("  Managed backend attempts: {}", stats.attempts_managed);
    println!("  Direct backend attempts: {}", stats.attempts_direct);
    println!("  Fetched: {}", stats.fetched);
    println!("  Failed: {}", stats.failed);
    if stats.cancelled > 0 {
        println!("  Cancelled before start: {}", stats.cancelled);
    }
    println!();

    if !report.failures.is_empty() {
        println!("Failures:");
        for failure in &report.failures {
            println!(
                "  {} ({}, {} attempts)",
                failure.target.locator, failure.error, failure.attempts
            );
        }
        println!();
    }

    println!("Elapsed: {:.1}s", stats.elapsed.as_secs_f64());
}

/// Prints store-wide counts for the `--stats` mode
pub fn print_store_summary(summary: &StoreSummary) {
    println!("=== Listing Store ===\n");
    println!("Total listings: {}", summary.total);
    println!("Active listings: {}", summary.active);

    if !summary.by_source.is_empty() {
        println!("\nBy source:");
        for (source, count) in &summary.by_source {
            println!("  {}: {}", source, count);
        }
    }

    if let Some(latest) = summary.latest_fetch {
        println!("\nLatest fetch: {}", latest.to_rfc3339());
    }
}

/// Writes the run's records as pretty-printed JSON
pub fn write_json_records(path: &Path, records: &[ListingRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{BackendKind, FetchErrorKind};
    use crate::source::SourceId;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_summary_line_without_failures() {
        let stats = RunStatistics {
            discovered: 42,
            skipped_fresh: 10,
            fetched: 32,
            ..Default::default()
        };
        assert_eq!(
            summary_line(&stats),
            "42 discovered, 10 skipped as fresh, 32 fetched, 0 permanently failed"
        );
    }

    #[test]
    fn test_summary_line_with_failure_breakdown() {
        let stats = RunStatistics {
            discovered: 42,
            skipped_fresh: 10,
            fetched: 28,
            failed: 4,
            failures_by_kind: HashMap::from([
                (FetchErrorKind::Blocked, 3),
                (FetchErrorKind::ExtractionFailure, 1),
            ]),
            elapsed: Duration::from_secs(12),
            ..Default::default()
        };
        assert_eq!(
            summary_line(&stats),
            "42 discovered, 10 skipped as fresh, 28 fetched, 4 permanently failed: \
             3 Blocked, 1 ExtractionFailure"
        );
    }

    #[test]
    fn test_write_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let records = vec![ListingRecord {
            uid: "rightmove:1".to_string(),
            source: SourceId::Rightmove,
            url: "https://rightmove.co.uk/properties/1".to_string(),
            title: Some("Flat to rent".to_string()),
            price_text: Some("£1,000 pcm".to_string()),
            price_pence: Some(100_000),
            bedrooms: Some(1),
            property_type: Some("flat".to_string()),
            address: None,
            postcode: None,
            backend: BackendKind::Direct,
            fetched_at: Utc::now(),
        }];

        write_json_records(&path, &records).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed[0]["uid"], "rightmove:1");
        assert_eq!(parsed[0]["source"], "rightmove");
        assert_eq!(parsed[0]["price_pence"], 100_000);
    }
}
