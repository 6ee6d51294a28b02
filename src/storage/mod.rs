//! Storage module for persisting scraped listings
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema version checks
//! - Property existence checks, inserts and updates keyed by name and zipcode
//! - Append-only unit inserts
//! - Run tracking and read-only statistics

mod schema;
mod sqlite;
mod traits;

pub use schema::{PROPERTY_COLUMNS, SCHEMA_VERSION, UNIT_COLUMNS};
pub use sqlite::SqliteStorage;
pub use traits::{Store, StorageError, StorageResult};

use crate::extract::Amenity;
use crate::TrawlError;
use std::collections::BTreeSet;
use std::path::Path;

/// Opens (or creates) the store at `path`
pub fn open_storage(path: &Path) -> Result<SqliteStorage, TrawlError> {
    SqliteStorage::new(path)
}

/// One physical property, keyed by `(property_name, zipcode)`
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    pub property_name: String,
    pub zipcode: String,
    pub address: Option<String>,
    pub neighborhood: Option<String>,
    pub city_name: String,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub source_url: String,
    pub amenities: BTreeSet<Amenity>,
    pub scraped_at: String,
}

impl PropertyRecord {
    pub fn has(&self, amenity: Amenity) -> bool {
        self.amenities.contains(&amenity)
    }
}

/// One advertised unit or floorplan, observed at `scraped_at`
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    pub property_name: String,
    pub zipcode: String,
    pub model_name: Option<String>,
    pub unit_number: Option<String>,

    /// Monthly rent; the lower bound when the site shows a range
    pub price: Option<i64>,

    /// Bedroom count, 0 for studios
    pub beds: Option<f64>,
    pub baths: Option<f64>,
    pub sqft: Option<i64>,
    pub date_available: Option<String>,
    pub studio: bool,
    pub price_is_range: bool,
    pub scraped_at: String,
}

impl UnitRecord {
    /// Returns false for placeholder units marked "Not Available"
    pub fn is_available(&self) -> bool {
        self.date_available.as_deref() != Some(crate::extract::NOT_AVAILABLE)
    }
}

/// A row to insert; the variant selects the target table
#[derive(Debug, Clone, Copy)]
pub enum Record<'a> {
    Property(&'a PropertyRecord),
    Unit(&'a UnitRecord),
}

impl Record<'_> {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Property(_) => "properties",
            Self::Unit(_) => "units",
        }
    }
}

/// Represents a job run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub city: String,
    pub state: String,
    pub config_hash: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub urls_discovered: u64,
    pub properties_inserted: u64,
    pub properties_updated: u64,
    pub units_inserted: u64,
    pub units_discarded: u64,
    pub urls_skipped: u64,
}

/// Status of a job run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Row counts for one city
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityCounts {
    pub city: String,
    pub properties: u64,
    pub units: u64,
}
