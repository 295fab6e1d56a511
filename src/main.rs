//! flathunt main entry point
//!
//! Command-line interface for the flathunt listing crawler.

use clap::Parser;
use flathunt::config::load_config_with_hash;
use flathunt::crawler::build_coordinator;
use flathunt::output::{print_run_summary, print_store_summary, write_json_records};
use flathunt::store::{shared, ListingStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// flathunt: a rental-listing crawler
///
/// flathunt discovers listings from portal search pages, fetches them
/// through per-source backends with rate limiting and retry, and stores
/// normalized records in SQLite.
#[derive(Parser, Debug)]
#[command(name = "flathunt")]
#[command(version = "0.1.0")]
#[command(about = "A rental-listing crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Refetch every discovered listing, ignoring freshness records
    #[arg(long)]
    ignore_freshness: bool,

    /// Stop fetching after this many seconds; in-flight requests finish
    #[arg(long, value_name = "SECS")]
    deadline_secs: Option<u64>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Write the run's records to this path as JSON
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, config_hash, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("flathunt=info,warn"),
            1 => EnvFilter::new("flathunt=debug,info"),
            2 => EnvFilter::new("flathunt=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &flathunt::Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== flathunt Dry Run ===\n");

    println!("Search:");
    println!(
        "  Freshness window: {}h",
        config.search.freshness_window_hours
    );
    println!("  Max pages per seed: {}", config.search.max_pages);

    println!("\nSeeds ({}):", config.search.seeds.len());
    for entry in &config.search.seeds {
        let backend = config
            .routing
            .get(&entry.source)
            .map(|k| k.as_str())
            .unwrap_or("unrouted");
        println!("  - [{}, via {}] {}", entry.source, backend, entry.url);
    }

    println!("\nRetry:");
    println!("  Max retries: {}", config.retry.max_retries);
    println!("  Base delay: {}ms", config.retry.base_delay_ms);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl up to {} search pages",
        config.search.seeds.len() * config.search.max_pages as usize
    );

    Ok(())
}

/// Handles the --stats mode: shows counts from the database
fn handle_stats(config: &flathunt::Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let store = SqliteStore::new(Path::new(&config.output.database_path))?;
    let summary = store.summary()?;
    print_store_summary(&summary);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: flathunt::Config,
    config_hash: String,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    let seeds = config.search_seeds()?;
    tracing::info!("Crawling {} seeds", seeds.len());

    let freshness_window = if cli.ignore_freshness {
        tracing::info!("Ignoring freshness records, refetching everything");
        Duration::ZERO
    } else {
        Duration::from_secs(config.search.freshness_window_hours * 3600)
    };

    let store = shared(SqliteStore::new(Path::new(&config.output.database_path))?);
    let run_id = store.lock().unwrap().begin_run(&config_hash)?;

    let cancel = CancellationToken::new();
    if let Some(secs) = cli.deadline_secs {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!("Deadline reached, cancelling remaining fetches");
            cancel.cancel();
        });
    }

    let coordinator = build_coordinator(&config, store.clone(), cancel)?;
    let report = match coordinator.run(&seeds, freshness_window).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    {
        let mut store = store.lock().unwrap();
        for record in &report.records {
            store.save_listing(record)?;
        }
        store.finish_run(run_id)?;
    }
    tracing::info!("Saved {} listings", report.records.len());

    if let Some(path) = &cli.export {
        write_json_records(path, &report.records)?;
        println!("✓ Records exported to: {}", path.display());
    }

    print_run_summary(&report);

    Ok(())
}
