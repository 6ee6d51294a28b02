//! Output module for side artifacts and reports
//!
//! This module handles:
//! - Writing and reading the discovered URL list of each job
//! - Loading and printing store statistics
//! - Printing per-job run summaries

pub mod stats;
mod url_list;

pub use stats::{load_statistics, print_run_summary, print_statistics, TrawlStatistics};
pub use url_list::{load_url_list, save_url_list, url_list_path};
