//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Store trait.

use crate::extract::Amenity;
use crate::state::RunSummary;
use crate::storage::schema::{initialize_schema, PROPERTY_COLUMNS, UNIT_COLUMNS};
use crate::storage::traits::{StorageError, Store, StorageResult};
use crate::storage::{CityCounts, PropertyRecord, Record, RunRecord, RunStatus, UnitRecord};
use crate::TrawlError;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

const RUN_COLUMNS: &str = "id, city, state, config_hash, started_at, finished_at, status,
     urls_discovered, properties_inserted, properties_updated, units_inserted,
     units_discarded, urls_skipped";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(TrawlError)` - Failed to open database, or its schema version differs
    pub fn new(path: &Path) -> Result<Self, TrawlError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, TrawlError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Flushes and closes the connection, surfacing any close error
    pub fn close(self) -> Result<(), TrawlError> {
        self.conn.close().map_err(|(_, e)| TrawlError::Database(e))
    }
}

/// `INSERT` with one numbered placeholder per column
fn insert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn text(value: &Option<String>) -> Value {
    value.clone().map(Value::Text).unwrap_or(Value::Null)
}

fn real(value: Option<f64>) -> Value {
    value.map(Value::Real).unwrap_or(Value::Null)
}

fn integer(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

/// Property fields in [`PROPERTY_COLUMNS`] order
fn property_values(property: &PropertyRecord) -> Vec<Value> {
    let mut values = vec![
        Value::Text(property.property_name.clone()),
        Value::Text(property.zipcode.clone()),
        text(&property.address),
        text(&property.neighborhood),
        Value::Text(property.city_name.clone()),
        text(&property.state),
        real(property.latitude),
        real(property.longitude),
        Value::Text(property.source_url.clone()),
    ];
    values.extend(
        Amenity::ALL
            .iter()
            .map(|amenity| Value::Integer(property.has(*amenity) as i64)),
    );
    values.push(Value::Text(property.scraped_at.clone()));
    values
}

/// Unit fields in [`UNIT_COLUMNS`] order
fn unit_values(unit: &UnitRecord) -> Vec<Value> {
    vec![
        Value::Text(unit.property_name.clone()),
        Value::Text(unit.zipcode.clone()),
        text(&unit.model_name),
        text(&unit.unit_number),
        integer(unit.price),
        real(unit.beds),
        real(unit.baths),
        integer(unit.sqft),
        text(&unit.date_available),
        Value::Integer(unit.studio as i64),
        Value::Integer(unit.price_is_range as i64),
        Value::Text(unit.scraped_at.clone()),
    ]
}

fn property_from_row(row: &Row<'_>) -> rusqlite::Result<PropertyRecord> {
    let mut amenities = BTreeSet::new();
    for (offset, amenity) in Amenity::ALL.iter().enumerate() {
        if row.get::<_, bool>(9 + offset)? {
            amenities.insert(*amenity);
        }
    }

    Ok(PropertyRecord {
        property_name: row.get(0)?,
        zipcode: row.get(1)?,
        address: row.get(2)?,
        neighborhood: row.get(3)?,
        city_name: row.get(4)?,
        state: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        source_url: row.get(8)?,
        amenities,
        scraped_at: row.get(9 + Amenity::ALL.len())?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        city: row.get(1)?,
        state: row.get(2)?,
        config_hash: row.get(3)?,
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Failed),
        urls_discovered: row.get::<_, i64>(7)? as u64,
        properties_inserted: row.get::<_, i64>(8)? as u64,
        properties_updated: row.get::<_, i64>(9)? as u64,
        units_inserted: row.get::<_, i64>(10)? as u64,
        units_discarded: row.get::<_, i64>(11)? as u64,
        urls_skipped: row.get::<_, i64>(12)? as u64,
    })
}

impl Store for SqliteStorage {
    // ===== Listings =====

    fn exists(&self, property_name: &str, zipcode: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM properties WHERE property_name = ?1 AND zipcode = ?2",
                params![property_name, zipcode],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert(&mut self, record: Record<'_>) -> StorageResult<()> {
        let (columns, values) = match record {
            Record::Property(property) => (&PROPERTY_COLUMNS[..], property_values(property)),
            Record::Unit(unit) => (&UNIT_COLUMNS[..], unit_values(unit)),
        };

        self.conn
            .execute(&insert_sql(record.table(), columns), params_from_iter(values))?;
        Ok(())
    }

    fn update(&mut self, property: &PropertyRecord) -> StorageResult<()> {
        // ?1 and ?2 are the key columns and double as the WHERE clause
        let assignments: Vec<String> = PROPERTY_COLUMNS
            .iter()
            .enumerate()
            .skip(2)
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect();
        let sql = format!(
            "UPDATE properties SET {} WHERE property_name = ?1 AND zipcode = ?2",
            assignments.join(", ")
        );

        let changed = self
            .conn
            .execute(&sql, params_from_iter(property_values(property)))?;

        if changed == 0 {
            return Err(StorageError::PropertyNotFound {
                name: property.property_name.clone(),
                zipcode: property.zipcode.clone(),
            });
        }
        Ok(())
    }

    fn get_property(
        &self,
        property_name: &str,
        zipcode: &str,
    ) -> StorageResult<Option<PropertyRecord>> {
        let sql = format!(
            "SELECT {} FROM properties WHERE property_name = ?1 AND zipcode = ?2",
            PROPERTY_COLUMNS.join(", ")
        );

        let property = self
            .conn
            .query_row(&sql, params![property_name, zipcode], property_from_row)
            .optional()?;

        Ok(property)
    }

    // ===== Transactions =====

    fn begin(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    // ===== Run Management =====

    fn create_run(&mut self, city: &str, state: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (city, state, config_hash, started_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![city, state, config_hash, now, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET finished_at = ?1, status = ?2, urls_discovered = ?3,
             properties_inserted = ?4, properties_updated = ?5, units_inserted = ?6,
             units_discarded = ?7, urls_skipped = ?8
             WHERE id = ?9",
            params![
                now,
                status.to_db_string(),
                summary.discovery.unique_urls as i64,
                summary.properties_inserted as i64,
                summary.properties_updated as i64,
                summary.units_inserted as i64,
                summary.units_discarded as i64,
                summary.skipped as i64,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);

        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn recent_runs(&self, limit: u32) -> StorageResult<Vec<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT ?1", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;

        let runs = stmt
            .query_map(params![limit], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    // ===== Statistics =====

    fn count_properties(&self, city: Option<&str>) -> StorageResult<u64> {
        let count: i64 = match city {
            Some(city) => self.conn.query_row(
                "SELECT COUNT(*) FROM properties WHERE city_name = ?1",
                params![city],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM properties", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    fn count_units(&self, city: Option<&str>) -> StorageResult<u64> {
        let count: i64 = match city {
            Some(city) => self.conn.query_row(
                "SELECT COUNT(*) FROM units u
                 JOIN properties p ON p.property_name = u.property_name AND p.zipcode = u.zipcode
                 WHERE p.city_name = ?1",
                params![city],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM units", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    fn city_counts(&self) -> StorageResult<Vec<CityCounts>> {
        let query = "
            SELECT p.city_name,
                   COUNT(DISTINCT p.property_name || char(31) || p.zipcode),
                   COUNT(u.id)
            FROM properties p
            LEFT JOIN units u ON u.property_name = p.property_name AND u.zipcode = p.zipcode
            GROUP BY p.city_name
            ORDER BY p.city_name
        ";

        let mut stmt = self.conn.prepare(query)?;
        let counts = stmt
            .query_map([], |row| {
                Ok(CityCounts {
                    city: row.get(0)?,
                    properties: row.get::<_, i64>(1)? as u64,
                    units: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PropertyAction, ScrapeOutcome};

    fn property(name: &str, zipcode: &str, city: &str) -> PropertyRecord {
        PropertyRecord {
            property_name: name.to_string(),
            zipcode: zipcode.to_string(),
            address: Some("1 Main St".to_string()),
            neighborhood: None,
            city_name: city.to_string(),
            state: Some("IL".to_string()),
            latitude: Some(41.88),
            longitude: Some(-87.62),
            source_url: format!("https://www.apartments.com/{}/", name.to_lowercase()),
            amenities: BTreeSet::from([Amenity::Pool, Amenity::PetsAllowed]),
            scraped_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn unit(name: &str, zipcode: &str, price: i64) -> UnitRecord {
        UnitRecord {
            property_name: name.to_string(),
            zipcode: zipcode.to_string(),
            model_name: Some("A1".to_string()),
            unit_number: Some("101".to_string()),
            price: Some(price),
            beds: Some(1.0),
            baths: Some(1.0),
            sqft: Some(650),
            date_available: Some("Now".to_string()),
            studio: false,
            price_is_range: false,
            scraped_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_insert_and_get_property() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let record = property("Lakeview", "60614", "Chicago");

        assert!(!storage.exists("Lakeview", "60614").unwrap());
        storage.insert(Record::Property(&record)).unwrap();
        assert!(storage.exists("Lakeview", "60614").unwrap());

        let loaded = storage.get_property("Lakeview", "60614").unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_same_name_different_zipcode_is_distinct() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .insert(Record::Property(&property("The Park", "60614", "Chicago")))
            .unwrap();
        storage
            .insert(Record::Property(&property("The Park", "60657", "Chicago")))
            .unwrap();

        assert_eq!(storage.count_properties(None).unwrap(), 2);
    }

    #[test]
    fn test_duplicate_property_insert_fails() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let record = property("Lakeview", "60614", "Chicago");

        storage.insert(Record::Property(&record)).unwrap();
        let result = storage.insert(Record::Property(&record));

        assert!(matches!(result, Err(StorageError::Sqlite(_))));
    }

    #[test]
    fn test_update_overwrites_mutable_columns() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut record = property("Lakeview", "60614", "Chicago");
        storage.insert(Record::Property(&record)).unwrap();

        record.address = Some("2 Main St".to_string());
        record.amenities = BTreeSet::from([Amenity::Garage]);
        record.latitude = None;
        record.scraped_at = "2024-02-01T00:00:00+00:00".to_string();
        storage.update(&record).unwrap();

        let loaded = storage.get_property("Lakeview", "60614").unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(loaded.has(Amenity::Garage));
        assert!(!loaded.has(Amenity::Pool));
        assert_eq!(storage.count_properties(None).unwrap(), 1);
    }

    #[test]
    fn test_update_missing_property() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let result = storage.update(&property("Ghost", "00000", "Chicago"));
        assert!(matches!(result, Err(StorageError::PropertyNotFound { .. })));
    }

    #[test]
    fn test_units_are_append_only() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .insert(Record::Property(&property("Lakeview", "60614", "Chicago")))
            .unwrap();

        let observed = unit("Lakeview", "60614", 1850);
        storage.insert(Record::Unit(&observed)).unwrap();
        storage.insert(Record::Unit(&observed)).unwrap();

        assert_eq!(storage.count_units(None).unwrap(), 2);
        assert_eq!(storage.count_units(Some("Chicago")).unwrap(), 2);
        assert_eq!(storage.count_units(Some("Boston")).unwrap(), 0);
    }

    #[test]
    fn test_unit_values_follow_column_order() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut studio = unit("Lakeview", "60614", 1500);
        studio.studio = true;
        studio.beds = None;
        storage.insert(Record::Unit(&studio)).unwrap();

        let sql = format!("SELECT {} FROM units", UNIT_COLUMNS.join(", "));
        let row: (String, Option<i64>, Option<f64>, Option<i64>, bool, bool) = storage
            .conn
            .query_row(&sql, [], |row| {
                Ok((
                    row.get(0)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(7)?,
                    row.get(9)?,
                    row.get(10)?,
                ))
            })
            .unwrap();

        assert_eq!(
            row,
            ("Lakeview".to_string(), Some(1500), None, Some(650), true, false)
        );
    }

    #[test]
    fn test_rollback_discards_writes() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        storage.begin().unwrap();
        storage
            .insert(Record::Property(&property("Lakeview", "60614", "Chicago")))
            .unwrap();
        storage.insert(Record::Unit(&unit("Lakeview", "60614", 1850))).unwrap();
        storage.rollback().unwrap();

        assert_eq!(storage.count_properties(None).unwrap(), 0);
        assert_eq!(storage.count_units(None).unwrap(), 0);

        storage.begin().unwrap();
        storage
            .insert(Record::Property(&property("Lakeview", "60614", "Chicago")))
            .unwrap();
        storage.commit().unwrap();

        assert_eq!(storage.count_properties(None).unwrap(), 1);
    }

    #[test]
    fn test_city_counts() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .insert(Record::Property(&property("Lakeview", "60614", "Chicago")))
            .unwrap();
        storage
            .insert(Record::Property(&property("Back Bay", "02116", "Boston")))
            .unwrap();
        storage
            .insert(Record::Unit(&unit("Lakeview", "60614", 1850)))
            .unwrap();
        storage
            .insert(Record::Unit(&unit("Lakeview", "60614", 2100)))
            .unwrap();

        let counts = storage.city_counts().unwrap();
        assert_eq!(
            counts,
            vec![
                CityCounts {
                    city: "Boston".to_string(),
                    properties: 1,
                    units: 0
                },
                CityCounts {
                    city: "Chicago".to_string(),
                    properties: 1,
                    units: 2
                },
            ]
        );
    }

    #[test]
    fn test_run_lifecycle() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("Chicago", "IL", "abc123").unwrap();
        assert!(run_id > 0);

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());

        let mut summary = RunSummary::default();
        summary.discovery.unique_urls = 4;
        summary.record(&ScrapeOutcome::Persisted {
            property: PropertyAction::Inserted,
            units_inserted: 3,
            units_discarded: 1,
        });
        storage
            .finish_run(run_id, RunStatus::Completed, &summary)
            .unwrap();

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
        assert_eq!(run.urls_discovered, 4);
        assert_eq!(run.properties_inserted, 1);
        assert_eq!(run.units_inserted, 3);
        assert_eq!(run.units_discarded, 1);
    }

    #[test]
    fn test_run_not_found() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_run(42),
            Err(StorageError::RunNotFound(42))
        ));
        assert!(matches!(
            storage.finish_run(42, RunStatus::Failed, &RunSummary::default()),
            Err(StorageError::RunNotFound(42))
        ));
    }

    #[test]
    fn test_recent_runs_newest_first() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = storage.create_run("Chicago", "IL", "h").unwrap();
        let second = storage.create_run("Boston", "MA", "h").unwrap();

        let runs = storage.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, second);
        assert_eq!(runs[1].id, first);

        assert_eq!(storage.recent_runs(1).unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.db");

        let mut storage = SqliteStorage::new(&path).unwrap();
        storage
            .insert(Record::Property(&property("Lakeview", "60614", "Chicago")))
            .unwrap();
        storage.close().unwrap();

        let storage = SqliteStorage::new(&path).unwrap();
        assert!(storage.exists("Lakeview", "60614").unwrap());
    }
}
