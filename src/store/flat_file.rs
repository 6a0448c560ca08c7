use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::records::{HistoryRecord, PerformanceRecord};
use super::Store;
use crate::error::PersistenceError;

pub const HISTORY_FILE: &str = "pollution_history.csv";
pub const PERFORMANCE_FILE: &str = "performance_log.csv";

// Column order must match the record structs' field order.
const HISTORY_HEADER: [&str; 7] = ["timestamp", "pm2_5", "pm10", "no2", "o3", "co", "hri_actual"];
const PERFORMANCE_HEADER: [&str; 4] = ["timestamp", "predicted_hri", "actual_hri", "error"];

/// CSV-backed store: one file per table under the data directory.
pub struct CsvStore {
    history_path: PathBuf,
    performance_path: PathBuf,
}

impl CsvStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            history_path: data_dir.join(HISTORY_FILE),
            performance_path: data_dir.join(PERFORMANCE_FILE),
        }
    }

    fn ensure_table(path: &Path, header: &[&str]) -> Result<(), PersistenceError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(File::create(path)?);
        writer.write_record(header)?;
        writer.flush()?;
        Ok(())
    }

    fn append<T: Serialize>(path: &Path, record: &T) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let write_header = file.metadata()?.len() == 0;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistenceError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        Ok(records)
    }

    /// Rewrite the performance log through a temp file so a crash mid-write
    /// never leaves a truncated table behind.
    fn rewrite_performance(&self, records: &[PerformanceRecord]) -> Result<(), PersistenceError> {
        let tmp_path = self.performance_path.with_extension("csv.tmp");
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(File::create(&tmp_path)?);
            writer.write_record(PERFORMANCE_HEADER)?;
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.performance_path)?;
        Ok(())
    }
}

impl Store for CsvStore {
    fn initialize(&self) -> Result<(), PersistenceError> {
        Self::ensure_table(&self.history_path, &HISTORY_HEADER)?;
        Self::ensure_table(&self.performance_path, &PERFORMANCE_HEADER)?;
        Ok(())
    }

    fn append_history(&self, record: &HistoryRecord) -> Result<(), PersistenceError> {
        Self::append(&self.history_path, record)
    }

    fn read_history(&self) -> Result<Vec<HistoryRecord>, PersistenceError> {
        Self::read_all(&self.history_path)
    }

    fn append_performance(&self, record: &PerformanceRecord) -> Result<(), PersistenceError> {
        Self::append(&self.performance_path, record)
    }

    fn read_performance(&self) -> Result<Vec<PerformanceRecord>, PersistenceError> {
        Self::read_all(&self.performance_path)
    }

    fn reconcile_last(&self, actual_hri: f64) -> Result<Option<f64>, PersistenceError> {
        let mut records: Vec<PerformanceRecord> = Self::read_all(&self.performance_path)?;
        let error = match records.last_mut() {
            Some(last) if !last.is_reconciled() => last.fill_outcome(actual_hri),
            _ => return Ok(None),
        };
        self.rewrite_performance(&records)?;
        Ok(Some(error))
    }
}
