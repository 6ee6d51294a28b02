//! Rent-Trawl main entry point
//!
//! This is the command-line interface for the Rent-Trawl listing ingester.

use anyhow::Context;
use clap::Parser;
use rent_trawl::config::{load_config_with_hash, Config};
use rent_trawl::crawler::{run_jobs, RunOptions};
use rent_trawl::output::{load_statistics, print_run_summary, print_statistics};
use rent_trawl::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Rent-Trawl: a rental-listing ingester
///
/// Rent-Trawl walks a listing site's search results across a price/page
/// grid for each configured city, follows every listing to its detail page,
/// and upserts the extracted properties and units into SQLite.
#[derive(Parser, Debug)]
#[command(name = "rent-trawl")]
#[command(version)]
#[command(about = "A rental-listing ingester", long_about = None)]
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

    /// Only run the job for this city
    #[arg(long, value_name = "NAME")]
    city: Option<String>,

    /// Reuse saved URL lists instead of rediscovering
    #[arg(long, conflicts_with = "stats")]
    resume: bool,

    /// Discover and save URL lists without writing to the database
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        return handle_stats(&config);
    }

    let options = RunOptions {
        city: cli.city,
        resume: cli.resume,
        dry_run: cli.dry_run,
    };
    handle_crawl(config, config_hash, options).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rent_trawl=info,warn"),
            1 => EnvFilter::new("rent_trawl=debug,info"),
            2 => EnvFilter::new("rent_trawl=trace,debug"),
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

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = Path::new(&config.store.database_path);
    println!("Database: {}\n", path.display());

    let storage = SqliteStorage::new(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);
    storage.close()?;

    Ok(())
}

/// Handles the crawl: runs every selected job until done or Ctrl-C
async fn handle_crawl(
    config: Config,
    config_hash: String,
    options: RunOptions,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            on_interrupt.cancel();
        }
    });

    if options.dry_run {
        tracing::info!("Dry run: URL lists only, database untouched");
    }

    let reports = run_jobs(config, config_hash, options, cancel.clone())
        .await
        .context("crawl failed")?;

    for report in &reports {
        print_run_summary(&report.city, &report.state, &report.summary);
    }

    if cancel.is_cancelled() {
        tracing::warn!("Stopped early after {} job(s)", reports.len());
    } else {
        tracing::info!("All {} job(s) completed", reports.len());
    }

    Ok(())
}
