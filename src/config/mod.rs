//! Configuration module for Rent-Trawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use rent_trawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawl.toml")).unwrap();
//! println!("Jobs configured: {}", config.jobs.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetcherConfig, JobConfig, OutputConfig, PolitenessConfig, StoreConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
