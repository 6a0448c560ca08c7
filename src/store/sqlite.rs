use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};

use super::records::{HistoryRecord, PerformanceRecord};
use super::Store;
use crate::error::PersistenceError;

pub const DB_FILE: &str = "airsentry.sqlite3";

const CURRENT_SCHEMA_VERSION: i32 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS pollution_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    pm2_5 REAL NOT NULL,
    pm10 REAL NOT NULL,
    no2 REAL NOT NULL,
    o3 REAL NOT NULL,
    co REAL NOT NULL,
    hri_actual REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS performance_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    predicted_hri REAL NOT NULL,
    actual_hri REAL,
    error REAL
);
";

/// SQLite-backed store: both tables in one embedded database file.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), PersistenceError> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version > CURRENT_SCHEMA_VERSION {
            return Err(PersistenceError::Corrupt(format!(
                "database schema version {version} is newer than supported version {CURRENT_SCHEMA_VERSION}"
            )));
        }

        if version < 1 {
            info!("applying schema version 1");
            self.conn.execute_batch(SCHEMA_V1)?;
        }

        if version < CURRENT_SCHEMA_VERSION {
            self.conn
                .pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
        }
        Ok(())
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<(), PersistenceError> {
        self.run_migrations()
    }

    fn append_history(&self, record: &HistoryRecord) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT INTO pollution_history (timestamp, pm2_5, pm10, no2, o3, co, hri_actual)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.timestamp.to_rfc3339(),
                record.pm2_5,
                record.pm10,
                record.no2,
                record.o3,
                record.co,
                record.hri_actual,
            ],
        )?;
        Ok(())
    }

    fn read_history(&self) -> Result<Vec<HistoryRecord>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, pm2_5, pm10, no2, o3, co, hri_actual
             FROM pollution_history ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, f64>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (timestamp, pm2_5, pm10, no2, o3, co, hri_actual) = row?;
            records.push(HistoryRecord {
                timestamp: parse_timestamp(&timestamp)?,
                pm2_5,
                pm10,
                no2,
                o3,
                co,
                hri_actual,
            });
        }
        Ok(records)
    }

    fn append_performance(&self, record: &PerformanceRecord) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT INTO performance_log (timestamp, predicted_hri, actual_hri, error)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.timestamp.to_rfc3339(),
                record.predicted_hri,
                record.actual_hri,
                record.error,
            ],
        )?;
        Ok(())
    }

    fn read_performance(&self) -> Result<Vec<PerformanceRecord>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, predicted_hri, actual_hri, error
             FROM performance_log ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<f64>>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (timestamp, predicted_hri, actual_hri, error) = row?;
            records.push(PerformanceRecord {
                timestamp: parse_timestamp(&timestamp)?,
                predicted_hri,
                actual_hri,
                error,
            });
        }
        Ok(records)
    }

    fn reconcile_last(&self, actual_hri: f64) -> Result<Option<f64>, PersistenceError> {
        let last = self
            .conn
            .query_row(
                "SELECT id, predicted_hri, actual_hri
                 FROM performance_log ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                    ))
                },
            )
            .optional()?;

        match last {
            Some((id, predicted, None)) => {
                let error = (predicted - actual_hri).abs();
                self.conn.execute(
                    "UPDATE performance_log SET actual_hri = ?1, error = ?2 WHERE id = ?3",
                    params![actual_hri, error, id],
                )?;
                Ok(Some(error))
            }
            _ => Ok(None),
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| PersistenceError::Corrupt(format!("bad timestamp {raw:?}: {err}")))
}
