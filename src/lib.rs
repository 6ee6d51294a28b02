//! Rent-Trawl: a rental-listing ingester
//!
//! This crate crawls a listing site's search-result pages across a price/page
//! grid, follows every discovered listing to its detail page, extracts
//! property and unit records, and upserts them into a SQLite store.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod search;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Rent-Trawl operations
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store writer stopped unexpectedly")]
    WriterGone,

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

// Re-export commonly used types
pub use config::Config;
pub use search::{page_url, parse_page_url, price_bands, PriceBand};
pub use state::{RunSummary, ScrapeOutcome, SkipReason};
