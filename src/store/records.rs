use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reading::Reading;

/// One row of the history table: a validated reading plus the index
/// computed from it. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub pm2_5: f64,
    pub pm10: f64,
    pub no2: f64,
    pub o3: f64,
    pub co: f64,
    pub hri_actual: f64,
}

impl HistoryRecord {
    pub fn from_reading(reading: &Reading, hri_actual: f64) -> Self {
        Self {
            timestamp: reading.timestamp,
            pm2_5: reading.pm2_5,
            pm10: reading.pm10,
            no2: reading.no2,
            o3: reading.o3,
            co: reading.co,
            hri_actual,
        }
    }

    /// Pollutant values in the shared feature column order.
    pub fn features(&self) -> [f64; 5] {
        [self.pm2_5, self.pm10, self.no2, self.o3, self.co]
    }
}

/// One row of the performance log. `predicted_hri` is written at append
/// time; `actual_hri` and `error` stay empty until the next cycle
/// reconciles the forecast against what actually happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub timestamp: DateTime<Utc>,
    pub predicted_hri: f64,
    pub actual_hri: Option<f64>,
    pub error: Option<f64>,
}

impl PerformanceRecord {
    pub fn new(timestamp: DateTime<Utc>, predicted_hri: f64) -> Self {
        Self {
            timestamp,
            predicted_hri,
            actual_hri: None,
            error: None,
        }
    }

    /// A record is awaiting reconciliation until its outcome is known.
    pub fn is_reconciled(&self) -> bool {
        self.actual_hri.is_some()
    }

    /// Fill the outcome fields. Returns the absolute forecast error.
    pub fn fill_outcome(&mut self, actual_hri: f64) -> f64 {
        let error = (self.predicted_hri - actual_hri).abs();
        self.actual_hri = Some(actual_hri);
        self.error = Some(error);
        error
    }
}
