use thiserror::Error;

/// Failure while acquiring a reading from the upstream provider.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("provider response carried no pollution entries")]
    MissingData,
}

/// A reading that signals a sensor or provider fault rather than real air.
#[derive(Debug, Error)]
#[error("implausible {pollutant} reading: {value}")]
pub struct ValidationError {
    pub pollutant: &'static str,
    pub value: f64,
}

/// Storage failure in either table.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv table operation failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("sqlite operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store is corrupt: {0}")]
    Corrupt(String),
}

/// Model artifact failure. A missing artifact file is not an error; it is
/// the bootstrap state.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact encoding failed: {0}")]
    Codec(#[from] bincode::Error),
}

/// Everything one pipeline cycle can die from.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("ingest failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("reading rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("model artifact failure: {0}")]
    Model(#[from] ModelError),
}
