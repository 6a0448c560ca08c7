//! Runtime configuration.
//!
//! Tunables live in an optional JSON settings file inside the data
//! directory. The provider credential is injected through the environment
//! at run time and is never written to disk or logged.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

/// Environment variable holding the provider credential.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

const SETTINGS_FILE: &str = "config.json";
const MODEL_DIR: &str = "models";
const MODEL_FILE: &str = "hri_model.bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Csv,
    Sqlite,
}

/// Tunables persisted in the settings file. Unknown files fall back to the
/// defaults field by field, so old files keep working as settings grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub latitude: f64,
    pub longitude: f64,
    pub storage_backend: StorageBackend,
    pub retrain_threshold: f64,
    pub min_training_rows: usize,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Navi Mumbai
            latitude: 19.0330,
            longitude: 73.0297,
            storage_backend: StorageBackend::Csv,
            retrain_threshold: 15.0,
            min_training_rows: 50,
            request_timeout_secs: 10,
        }
    }
}

impl Settings {
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        match serde_json::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                warn!(
                    "settings file {} is malformed ({err}), using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
        }
    }
}

/// Fully resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub model_path: PathBuf,
    pub latitude: f64,
    pub longitude: f64,
    pub storage_backend: StorageBackend,
    pub retrain_threshold: f64,
    pub min_training_rows: usize,
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Resolve configuration from the data directory's settings file, or
    /// the defaults when no file exists.
    pub fn load(data_dir: PathBuf) -> Result<Self> {
        let settings = Settings::load(&data_dir.join(SETTINGS_FILE))?;
        Ok(Self::from_settings(data_dir, settings))
    }

    fn from_settings(data_dir: PathBuf, settings: Settings) -> Self {
        let model_path = data_dir.join(MODEL_DIR).join(MODEL_FILE);
        Self {
            data_dir,
            model_path,
            latitude: settings.latitude,
            longitude: settings.longitude,
            storage_backend: settings.storage_backend,
            retrain_threshold: settings.retrain_threshold,
            min_training_rows: settings.min_training_rows,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

/// Read the provider credential from the environment. Only the paths that
/// actually talk to the provider call this.
pub fn provider_api_key() -> Result<String> {
    env::var(API_KEY_ENV)
        .with_context(|| format!("{API_KEY_ENV} is not set; export it or add it to .env"))
}
