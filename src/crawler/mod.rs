//! Crawler module for the two-phase city crawl
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with redirect detection
//! - The politeness policy shared by every fetch of a job
//! - Discovery of listing URLs across the price/page grid
//! - Detail-page parsing and persistence through a single store writer
//! - Overall job coordination

mod coordinator;
mod detail;
mod discovery;
mod fetcher;
mod politeness;
mod writer;

#[cfg(test)]
mod testing;

pub use coordinator::{run_jobs, Coordinator, JobReport, RunOptions};
pub use detail::{parse_detail, persist_detail, scrape_details, DetailSettings};
pub use discovery::{classify_page, discover, Discovery};
pub use fetcher::{
    build_http_client, fetch_following, fetch_url, FetchResult, HttpFetcher, PageFetcher,
    MAX_REDIRECTS,
};
pub use politeness::{PoliteFetcher, Politeness};
pub use writer::{StoreWriter, WriteRequest, WriterHandle, WriterOutput};
