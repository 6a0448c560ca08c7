//! Persistence for the two tables the pipeline lives on.
//!
//! Both tables are append-only. The single exception is reconciliation,
//! which fills the outcome columns of the newest performance row exactly
//! once. Everything behind [`Store`] is swappable; the pipeline never
//! touches files or connections directly.

mod flat_file;
mod records;
mod sqlite;

use std::path::Path;

pub use flat_file::CsvStore;
pub use records::{HistoryRecord, PerformanceRecord};
pub use sqlite::SqliteStore;

use crate::config::StorageBackend;
use crate::error::PersistenceError;

/// Append-record and read-all over the history table and performance log.
pub trait Store {
    /// Create whatever the backend needs (headers, schema) so empty tables
    /// read back as zero rows. Idempotent.
    fn initialize(&self) -> Result<(), PersistenceError>;

    fn append_history(&self, record: &HistoryRecord) -> Result<(), PersistenceError>;

    /// All history rows, oldest first.
    fn read_history(&self) -> Result<Vec<HistoryRecord>, PersistenceError>;

    fn append_performance(&self, record: &PerformanceRecord) -> Result<(), PersistenceError>;

    /// All performance rows, oldest first.
    fn read_performance(&self) -> Result<Vec<PerformanceRecord>, PersistenceError>;

    /// Fill the newest performance row's outcome, if it is still awaiting
    /// one. Returns the absolute forecast error when a fill happened, and
    /// `None` on an empty log or an already reconciled row.
    fn reconcile_last(&self, actual_hri: f64) -> Result<Option<f64>, PersistenceError>;
}

/// Open the backend the configuration names, rooted at `data_dir`.
pub fn open_store(
    backend: StorageBackend,
    data_dir: &Path,
) -> Result<Box<dyn Store>, PersistenceError> {
    match backend {
        StorageBackend::Csv => Ok(Box::new(CsvStore::new(data_dir))),
        StorageBackend::Sqlite => Ok(Box::new(SqliteStore::open(
            &data_dir.join(sqlite::DB_FILE),
        )?)),
    }
}
