//! Health Risk Index scoring.
//!
//! Each pollutant concentration is standardized against its safety limit,
//! weighted by health impact, and the weighted sum is scaled to an index
//! where 100 means "at the blended safety limit".

use serde::{Deserialize, Serialize};

use crate::reading::Reading;

/// Health-impact weights per pollutant. Sum to 1.0; PM2.5 dominates.
const WEIGHT_PM2_5: f64 = 0.40;
const WEIGHT_PM10: f64 = 0.20;
const WEIGHT_NO2: f64 = 0.15;
const WEIGHT_O3: f64 = 0.15;
const WEIGHT_CO: f64 = 0.10;

/// Safety limits the concentrations are standardized against.
/// Particulates and gases in ug/m3, CO in mg/m3.
const LIMIT_PM2_5: f64 = 25.0;
const LIMIT_PM10: f64 = 50.0;
const LIMIT_NO2: f64 = 40.0;
const LIMIT_O3: f64 = 100.0;
const LIMIT_CO: f64 = 10.0;

/// Compute the Health Risk Index for a reading, rounded to two decimals.
///
/// A reading exactly at every safety limit scores 100.0. The index is
/// unbounded above and scales linearly with each concentration.
pub fn compute_hri(reading: &Reading) -> f64 {
    let score = (reading.pm2_5 / LIMIT_PM2_5) * WEIGHT_PM2_5
        + (reading.pm10 / LIMIT_PM10) * WEIGHT_PM10
        + (reading.no2 / LIMIT_NO2) * WEIGHT_NO2
        + (reading.o3 / LIMIT_O3) * WEIGHT_O3
        + (reading.co / LIMIT_CO) * WEIGHT_CO;
    round2(score * 100.0)
}

/// Round to two decimal places, the precision every stored index uses.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Risk band for an index value. Band edges are lower-inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Good,
    Moderate,
    Unhealthy,
    Hazardous,
}

impl RiskLevel {
    pub fn from_hri(hri: f64) -> Self {
        if hri < 50.0 {
            RiskLevel::Good
        } else if hri < 100.0 {
            RiskLevel::Moderate
        } else if hri < 150.0 {
            RiskLevel::Unhealthy
        } else {
            RiskLevel::Hazardous
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Good => "good",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Unhealthy => "unhealthy",
            RiskLevel::Hazardous => "hazardous",
        }
    }

    /// Precaution text shown alongside the band.
    pub fn guidance(&self) -> &'static str {
        match self {
            RiskLevel::Good => "Air quality is good. Enjoy outdoor activities.",
            RiskLevel::Moderate => {
                "Moderate risk. Sensitive individuals should reduce prolonged exertion."
            }
            RiskLevel::Unhealthy => {
                "Unhealthy. Wear a mask (N95) and avoid heavy outdoor exercise."
            }
            RiskLevel::Hazardous => "Hazardous! Stay indoors and use air purifiers if possible.",
        }
    }
}
