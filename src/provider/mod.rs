//! Reading acquisition.
//!
//! The pipeline only ever sees [`ReadingProvider`]; the HTTP details of a
//! concrete upstream stay behind it, and tests swap in canned providers.

use async_trait::async_trait;

use crate::error::IngestError;
use crate::reading::Reading;

mod openweather;

pub use openweather::OpenWeatherProvider;

/// Source of one air-quality reading per pipeline cycle.
#[async_trait]
pub trait ReadingProvider {
    async fn fetch_reading(&self) -> Result<Reading, IngestError>;
}
