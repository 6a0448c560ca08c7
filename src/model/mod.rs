//! Forecast model lifecycle: train, persist, load, predict.
//!
//! The trained regressor is wrapped in an artifact carrying its training
//! provenance and replaced wholesale on every retrain. Loading tolerates a
//! missing file, which is simply the state before the first training run.

mod gbrt;

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::store::HistoryRecord;

pub use gbrt::{GbrtParams, GradientBoostedRegressor};

/// Number of pollutant features the model consumes.
pub const FEATURE_COUNT: usize = 5;

/// Persisted snapshot of a trained regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub model: GradientBoostedRegressor,
}

/// A loaded (or freshly trained) model ready to predict.
pub struct Forecaster {
    artifact: ModelArtifact,
}

impl Forecaster {
    /// Load the persisted artifact if one exists. A missing file is the
    /// bootstrap state, not an error.
    pub fn load(path: &Path) -> Result<Option<Self>, ModelError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let artifact = bincode::deserialize(&bytes)?;
        Ok(Some(Self { artifact }))
    }

    /// Fit a fresh regressor on the full history: the five pollutant
    /// columns as features, `hri_actual` as the target.
    pub fn train(history: &[HistoryRecord], params: GbrtParams) -> Self {
        let (x, y) = design_matrix(history);
        let model = GradientBoostedRegressor::fit(x.view(), y.view(), params);
        let mae = model.mean_absolute_error(x.view(), y.view());
        let params = model.params();
        info!(
            "trained forecast model on {} rows ({} trees, depth {}, in-sample MAE {:.2})",
            history.len(),
            params.n_estimators,
            params.max_depth,
            mae
        );
        Self {
            artifact: ModelArtifact {
                trained_at: Utc::now(),
                training_rows: history.len(),
                model,
            },
        }
    }

    /// Replace the artifact on disk through a temp file and rename, so a
    /// crash mid-write cannot leave a half-written artifact.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = bincode::serialize(&self.artifact)?;
        let tmp_path = path.with_extension("bin.tmp");
        fs::write(&tmp_path, &bytes)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        self.artifact.model.predict_one(features)
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.artifact.trained_at
    }

    pub fn training_rows(&self) -> usize {
        self.artifact.training_rows
    }
}

fn design_matrix(history: &[HistoryRecord]) -> (Array2<f64>, Array1<f64>) {
    let mut x = Array2::zeros((history.len(), FEATURE_COUNT));
    let mut y = Array1::zeros(history.len());
    for (row, record) in history.iter().enumerate() {
        for (column, value) in record.features().into_iter().enumerate() {
            x[[row, column]] = value;
        }
        y[row] = record.hri_actual;
    }
    (x, y)
}
