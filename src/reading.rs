use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One pollutant reading for the configured location.
///
/// Concentrations follow the provider units: particulates and gases in
/// ug/m3, CO in mg/m3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub pm2_5: f64,
    pub pm10: f64,
    pub no2: f64,
    pub o3: f64,
    pub co: f64,
}

impl Reading {
    /// Pollutant values in the fixed column order used everywhere: the
    /// training matrix, prediction input, and stored tables all share it.
    pub fn features(&self) -> [f64; 5] {
        [self.pm2_5, self.pm10, self.no2, self.o3, self.co]
    }

    /// Named values in the same order as [`features`](Self::features).
    pub fn named_features(&self) -> [(&'static str, f64); 5] {
        [
            ("pm2_5", self.pm2_5),
            ("pm10", self.pm10),
            ("no2", self.no2),
            ("o3", self.o3),
            ("co", self.co),
        ]
    }

    /// Reject readings that signal a sensor or provider fault rather than
    /// genuinely clean air. Outdoor concentrations are never zero or
    /// negative on a working sensor.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (pollutant, value) in self.named_features() {
            if !value.is_finite() || value <= 0.0 {
                return Err(ValidationError { pollutant, value });
            }
        }
        Ok(())
    }
}
