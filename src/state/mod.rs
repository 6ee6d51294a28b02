//! Crawl progress and outcome types
//!
//! This module defines:
//! - What a fetched search-result page means for its band's page loop
//! - The outcome of processing one detail-page URL
//! - The aggregated summary of a job run

mod page_step;
mod scrape_outcome;
mod summary;

pub use page_step::PageStep;
pub use scrape_outcome::{PropertyAction, ScrapeOutcome, SkipReason};
pub use summary::{DiscoveryReport, RunSummary};
