//! Statistics generation from the listings database
//!
//! This module provides functionality for extracting and displaying
//! store totals, per-city counts, recent runs and per-job summaries.

use crate::state::RunSummary;
use crate::storage::{CityCounts, RunRecord, Store};
use crate::TrawlError;
use chrono::{DateTime, Utc};

/// Number of runs shown by `--stats`
const RECENT_RUNS: u32 = 10;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct TrawlStatistics {
    pub total_properties: u64,
    pub total_units: u64,

    /// Row counts per city, ordered by city name
    pub by_city: Vec<CityCounts>,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(TrawlStatistics)` - Successfully loaded statistics
/// * `Err(TrawlError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Store) -> Result<TrawlStatistics, TrawlError> {
    Ok(TrawlStatistics {
        total_properties: storage.count_properties(None)?,
        total_units: storage.count_units(None)?,
        by_city: storage.city_counts()?,
        recent_runs: storage.recent_runs(RECENT_RUNS)?,
    })
}

/// Wall-clock duration of a finished run, in seconds
pub fn run_duration_secs(run: &RunRecord) -> Option<i64> {
    let started = run.started_at.parse::<DateTime<Utc>>().ok()?;
    let finished = run.finished_at.as_deref()?.parse::<DateTime<Utc>>().ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &TrawlStatistics) {
    println!("=== Listing Statistics ===\n");

    println!("Overview:");
    println!("  Properties: {}", stats.total_properties);
    println!("  Units: {}", stats.total_units);
    println!();

    if !stats.by_city.is_empty() {
        println!("By City:");
        for counts in &stats.by_city {
            println!(
                "  {}: {} properties, {} units",
                counts.city, counts.properties, counts.units
            );
        }
        println!();
    }

    if !stats.recent_runs.is_empty() {
        println!("Recent Runs:");
        for run in &stats.recent_runs {
            let duration = run_duration_secs(run)
                .map(|secs| format!("{}s", secs))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  #{} {}, {} [{}] {}: {} URLs, {} new, {} updated, {} units, {} skipped",
                run.id,
                run.city,
                run.state,
                run.status.to_db_string(),
                duration,
                run.urls_discovered,
                run.properties_inserted,
                run.properties_updated,
                run.units_inserted,
                run.urls_skipped
            );
        }
    }
}

/// Prints the outcome of one job to stdout
pub fn print_run_summary(city: &str, state: &str, summary: &RunSummary) {
    let discovery = &summary.discovery;

    println!("=== {}, {} ===", city, state);
    println!(
        "  Discovery: {} unique URLs ({} seen) from {} pages, {} failed, {} of {} bands ended by redirect",
        discovery.unique_urls,
        discovery.urls_seen,
        discovery.pages_fetched,
        discovery.pages_failed,
        discovery.bands_ended_by_redirect,
        discovery.bands_visited
    );
    println!(
        "  Properties: {} inserted, {} updated",
        summary.properties_inserted, summary.properties_updated
    );
    println!(
        "  Units: {} inserted, {} not available",
        summary.units_inserted, summary.units_discarded
    );

    if summary.skipped > 0 {
        let kinds: Vec<String> = summary
            .skipped_by_kind
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind))
            .collect();
        println!("  Skipped: {} ({})", summary.skipped, kinds.join(", "));
    }

    if summary.cancelled {
        println!("  Cancelled before completion");
    }
}
