//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::RunSummary;
use crate::storage::{CityCounts, PropertyRecord, Record, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Property not found: {name} ({zipcode})")]
    PropertyNotFound { name: String, zipcode: String },

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Schema version {found} does not match expected version {expected}")]
    SchemaMismatch { found: i64, expected: i64 },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every write goes through one owner of the store, so implementations need
/// not be shareable across threads.
pub trait Store {
    // ===== Listings =====

    /// Checks whether a property with this natural key is stored
    fn exists(&self, property_name: &str, zipcode: &str) -> StorageResult<bool>;

    /// Inserts a property or unit row
    ///
    /// Inserting a property whose key already exists is a constraint
    /// violation; callers check [`Store::exists`] first.
    fn insert(&mut self, record: Record<'_>) -> StorageResult<()>;

    /// Overwrites every mutable column of an existing property
    fn update(&mut self, property: &PropertyRecord) -> StorageResult<()>;

    /// Loads a property by natural key
    fn get_property(&self, property_name: &str, zipcode: &str)
        -> StorageResult<Option<PropertyRecord>>;

    // ===== Transactions =====

    /// Opens a transaction; writes until [`Store::commit`] land together
    fn begin(&mut self) -> StorageResult<()>;

    fn commit(&mut self) -> StorageResult<()>;

    /// Discards every write since [`Store::begin`]
    fn rollback(&mut self) -> StorageResult<()>;

    // ===== Run Management =====

    /// Records the start of a job run and returns its ID
    fn create_run(&mut self, city: &str, state: &str, config_hash: &str) -> StorageResult<i64>;

    /// Stores a run's final status and totals
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Most recent runs, newest first
    fn recent_runs(&self, limit: u32) -> StorageResult<Vec<RunRecord>>;

    // ===== Statistics =====

    /// Counts property rows, optionally for one city
    fn count_properties(&self, city: Option<&str>) -> StorageResult<u64>;

    /// Counts unit rows, optionally for properties of one city
    fn count_units(&self, city: Option<&str>) -> StorageResult<u64>;

    /// Property and unit counts per city, ordered by city name
    fn city_counts(&self) -> StorageResult<Vec<CityCounts>>;
}
