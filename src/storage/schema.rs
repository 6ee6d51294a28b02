//! Database schema definitions and version check
//!
//! Downstream consumers read these tables with a fixed column order, so the
//! column lists below are the single source for both DDL order and inserts.

use crate::storage::traits::{StorageError, StorageResult};
use rusqlite::Connection;

/// Bumped whenever a table's columns change
pub const SCHEMA_VERSION: i64 = 1;

/// Column order of the `properties` table
pub const PROPERTY_COLUMNS: [&str; 21] = [
    "property_name",
    "zipcode",
    "address",
    "neighborhood",
    "city_name",
    "state",
    "latitude",
    "longitude",
    "source_url",
    "fitness_center",
    "air_conditioning",
    "in_unit_washer_dryer",
    "laundry_facilities",
    "roof",
    "concierge",
    "pool",
    "elevator",
    "garage",
    "dishwasher",
    "pets_allowed",
    "scraped_at",
];

/// Column order of the `units` table, after its row id
pub const UNIT_COLUMNS: [&str; 12] = [
    "property_name",
    "zipcode",
    "model_name",
    "unit_number",
    "price",
    "beds",
    "baths",
    "sqft",
    "date_available",
    "studio",
    "price_is_range",
    "scraped_at",
];

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per physical property
CREATE TABLE IF NOT EXISTS properties (
    property_name TEXT NOT NULL,
    zipcode TEXT NOT NULL,
    address TEXT,
    neighborhood TEXT,
    city_name TEXT NOT NULL,
    state TEXT,
    latitude REAL,
    longitude REAL,
    source_url TEXT NOT NULL,
    fitness_center INTEGER NOT NULL DEFAULT 0,
    air_conditioning INTEGER NOT NULL DEFAULT 0,
    in_unit_washer_dryer INTEGER NOT NULL DEFAULT 0,
    laundry_facilities INTEGER NOT NULL DEFAULT 0,
    roof INTEGER NOT NULL DEFAULT 0,
    concierge INTEGER NOT NULL DEFAULT 0,
    pool INTEGER NOT NULL DEFAULT 0,
    elevator INTEGER NOT NULL DEFAULT 0,
    garage INTEGER NOT NULL DEFAULT 0,
    dishwasher INTEGER NOT NULL DEFAULT 0,
    pets_allowed INTEGER NOT NULL DEFAULT 0,
    scraped_at TEXT NOT NULL,
    PRIMARY KEY (property_name, zipcode)
);

CREATE INDEX IF NOT EXISTS idx_properties_city ON properties(city_name);
CREATE INDEX IF NOT EXISTS idx_properties_zipcode ON properties(zipcode);

-- Point-in-time unit observations; (property_name, zipcode) matches a property
CREATE TABLE IF NOT EXISTS units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    property_name TEXT NOT NULL,
    zipcode TEXT NOT NULL,
    model_name TEXT,
    unit_number TEXT,
    price INTEGER,
    beds REAL,
    baths REAL,
    sqft INTEGER,
    date_available TEXT,
    studio INTEGER NOT NULL DEFAULT 0,
    price_is_range INTEGER NOT NULL DEFAULT 0,
    scraped_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_units_property ON units(property_name, zipcode);

-- Track job runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    urls_discovered INTEGER NOT NULL DEFAULT 0,
    properties_inserted INTEGER NOT NULL DEFAULT 0,
    properties_updated INTEGER NOT NULL DEFAULT 0,
    units_inserted INTEGER NOT NULL DEFAULT 0,
    units_discarded INTEGER NOT NULL DEFAULT 0,
    urls_skipped INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the schema, or checks the version of an existing database
///
/// # Returns
///
/// * `Ok(())` - Schema is present at [`SCHEMA_VERSION`]
/// * `Err(StorageError::SchemaMismatch)` - The file was written by another version
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    match found {
        0 => {
            conn.execute_batch(SCHEMA_SQL)?;
            conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
            Ok(())
        }
        SCHEMA_VERSION => {
            conn.execute_batch(SCHEMA_SQL)?;
            Ok(())
        }
        found => Err(StorageError::SchemaMismatch {
            found,
            expected: SCHEMA_VERSION,
        }),
    }
}
