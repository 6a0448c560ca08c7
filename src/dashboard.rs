//! Read-side data contract for the dashboard.
//!
//! This module only shapes data; rendering lives in whatever frontend
//! consumes the JSON. Field names are camelCase for that consumer. The
//! snapshot degrades to a waiting state instead of failing when the stores
//! are missing, empty, or unreadable.

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use crate::scoring::RiskLevel;
use crate::store::{PerformanceRecord, Store};

/// How many of the newest performance rows the accuracy chart shows.
const ACCURACY_CHART_POINTS: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DashboardSnapshot {
    Waiting { reason: String },
    Ready(DashboardData),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub summary: SummaryTiles,
    pub banner: RiskBanner,
    pub hri_trend: Vec<TrendPoint>,
    pub forecast_accuracy: Vec<AccuracyPoint>,
}

/// The four headline metrics, all taken from the newest rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTiles {
    pub current_hri: f64,
    pub pm2_5: f64,
    pub o3: f64,
    pub latest_error: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskBanner {
    pub level: RiskLevel,
    pub hri: f64,
    pub guidance: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub hri_actual: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyPoint {
    pub timestamp: DateTime<Utc>,
    pub predicted_hri: f64,
    pub actual_hri: Option<f64>,
}

/// Assemble the snapshot from whatever the store currently holds.
pub fn build_snapshot(store: &dyn Store) -> DashboardSnapshot {
    let history = match store.read_history() {
        Ok(history) => history,
        Err(err) => {
            warn!("history table unreadable: {err}");
            return DashboardSnapshot::Waiting {
                reason: format!("history unavailable: {err}"),
            };
        }
    };
    let performance = match store.read_performance() {
        Ok(performance) => performance,
        Err(err) => {
            warn!("performance log unreadable: {err}");
            return DashboardSnapshot::Waiting {
                reason: format!("performance log unavailable: {err}"),
            };
        }
    };

    let Some(latest) = history.last() else {
        return DashboardSnapshot::Waiting {
            reason: "no readings recorded yet; run a pipeline cycle first".to_string(),
        };
    };

    let level = RiskLevel::from_hri(latest.hri_actual);
    let latest_error = performance.iter().rev().find_map(|record| record.error);

    let hri_trend = history
        .iter()
        .map(|record| TrendPoint {
            timestamp: record.timestamp,
            hri_actual: record.hri_actual,
        })
        .collect();

    let accuracy_window =
        &performance[performance.len().saturating_sub(ACCURACY_CHART_POINTS)..];
    let forecast_accuracy = accuracy_window.iter().map(accuracy_point).collect();

    DashboardSnapshot::Ready(DashboardData {
        summary: SummaryTiles {
            current_hri: latest.hri_actual,
            pm2_5: latest.pm2_5,
            o3: latest.o3,
            latest_error,
        },
        banner: RiskBanner {
            level,
            hri: latest.hri_actual,
            guidance: level.guidance().to_string(),
        },
        hri_trend,
        forecast_accuracy,
    })
}

fn accuracy_point(record: &PerformanceRecord) -> AccuracyPoint {
    AccuracyPoint {
        timestamp: record.timestamp,
        predicted_hri: record.predicted_hri,
        actual_hri: record.actual_hri,
    }
}
