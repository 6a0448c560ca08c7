//! One self-correcting forecast cycle.
//!
//! Each invocation walks the same path: ingest a reading, validate it,
//! score it, reconcile the previous cycle's forecast against it, retrain
//! the model if that forecast drifted, forecast the next cycle, persist,
//! report. State lives entirely in the store and the model artifact, so
//! consecutive invocations form one continuous loop.

use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::model::{Forecaster, GbrtParams};
use crate::provider::ReadingProvider;
use crate::scoring::{compute_hri, round2, RiskLevel};
use crate::store::{HistoryRecord, PerformanceRecord, Store};

/// Outcome summary of one completed cycle.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    pub hri_actual: f64,
    pub risk: RiskLevel,
    pub predicted_next: f64,
    pub reconciled_error: Option<f64>,
    pub retrained: bool,
    pub naive_forecast: bool,
}

pub async fn run_cycle(
    provider: &dyn ReadingProvider,
    store: &dyn Store,
    config: &AppConfig,
) -> Result<RunReport, PipelineError> {
    let started = Instant::now();

    // 1. Ingest
    let reading = provider.fetch_reading().await?;

    // 2. Validate
    reading.validate()?;

    // 3. Score
    let hri_actual = compute_hri(&reading);

    // 4. Reconcile the previous forecast. Nothing to fill on the first
    // ever run or when the newest row already has its outcome.
    store.initialize()?;
    let reconciled_error = store.reconcile_last(hri_actual)?;
    if let Some(error) = reconciled_error {
        info!("reconciled previous forecast, absolute error {error:.2}");
    }

    // 5. Retrain gate. A missing artifact forces a bootstrap attempt; a
    // reconciled error above the threshold forces a corrective one.
    let mut forecaster = match Forecaster::load(&config.model_path) {
        Ok(loaded) => loaded,
        Err(err) => {
            warn!("model artifact unreadable ({err}), scheduling bootstrap retrain");
            None
        }
    };
    let mut retrained = false;
    let error_exceeded = reconciled_error
        .map_or(false, |error| error > config.retrain_threshold);
    if forecaster.is_none() || error_exceeded {
        if error_exceeded {
            warn!(
                "forecast error exceeded threshold {:.2}, retraining",
                config.retrain_threshold
            );
        } else {
            info!("no trained model yet, attempting bootstrap training");
        }
        if let Some(fresh) = maybe_retrain(store, config)? {
            forecaster = Some(fresh);
            retrained = true;
        }
    }

    // 6. Forecast the next cycle. Without a model the best available
    // estimate is persistence: tomorrow looks like today.
    let (predicted_next, naive_forecast) = match &forecaster {
        Some(model) => (round2(model.predict(&reading.features()).max(0.0)), false),
        None => (hri_actual, true),
    };

    // 7. Persist
    store.append_performance(&PerformanceRecord::new(reading.timestamp, predicted_next))?;
    store.append_history(&HistoryRecord::from_reading(&reading, hri_actual))?;

    // 8. Report
    let risk = RiskLevel::from_hri(hri_actual);
    info!(
        "current HRI {:.2} ({}), next-cycle forecast {:.2}{}{}",
        hri_actual,
        risk.as_str(),
        predicted_next,
        if naive_forecast { " [naive]" } else { "" },
        if retrained { " [retrained]" } else { "" },
    );
    info!("precaution: {}", risk.guidance());
    info!("cycle completed in {}ms", started.elapsed().as_millis());

    Ok(RunReport {
        timestamp: reading.timestamp,
        hri_actual,
        risk,
        predicted_next,
        reconciled_error,
        retrained,
        naive_forecast,
    })
}

/// Retrain on the full recorded history and atomically replace the
/// artifact. Skipped with a log line when history is still too short to
/// support a meaningful fit.
pub fn maybe_retrain(
    store: &dyn Store,
    config: &AppConfig,
) -> Result<Option<Forecaster>, PipelineError> {
    let history = store.read_history()?;
    if history.len() < config.min_training_rows {
        info!(
            "retrain skipped, {} of {} required history rows",
            history.len(),
            config.min_training_rows
        );
        return Ok(None);
    }

    let forecaster = Forecaster::train(&history, GbrtParams::default());
    forecaster.save(&config.model_path)?;
    info!("model artifact replaced at {}", config.model_path.display());
    Ok(Some(forecaster))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use crate::reading::Reading;
    use crate::store::CsvStore;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(data_dir: &Path) -> AppConfig {
        AppConfig {
            data_dir: data_dir.to_path_buf(),
            model_path: data_dir.join("models/hri_model.bin"),
            latitude: 19.0330,
            longitude: 73.0297,
            storage_backend: StorageBackend::Csv,
            retrain_threshold: 15.0,
            min_training_rows: 50,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn seed_history(store: &dyn Store, rows: usize) {
        for i in 0..rows {
            let reading = Reading {
                timestamp: Utc::now(),
                pm2_5: 5.0 + (i % 30) as f64,
                pm10: 20.0,
                no2: 10.0,
                o3: 30.0,
                co: 2.0,
            };
            let hri = compute_hri(&reading);
            store
                .append_history(&HistoryRecord::from_reading(&reading, hri))
                .unwrap();
        }
    }

    #[test]
    fn retrain_is_a_no_op_below_minimum_history() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let store = CsvStore::new(dir.path());

        seed_history(&store, 49);
        let result = maybe_retrain(&store, &config).unwrap();
        assert!(result.is_none());
        assert!(!config.model_path.exists());
    }

    #[test]
    fn retrain_writes_an_artifact_at_minimum_history() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let store = CsvStore::new(dir.path());

        seed_history(&store, 50);
        let result = maybe_retrain(&store, &config).unwrap();
        assert!(result.is_some());
        assert!(config.model_path.exists());

        let loaded = Forecaster::load(&config.model_path).unwrap().unwrap();
        assert_eq!(loaded.training_rows(), 50);
    }

    use crate::error::IngestError;
    use crate::store::open_store;
    use async_trait::async_trait;

    /// Hands out the same concentrations every cycle, stamped fresh.
    struct StaticProvider {
        pm2_5: f64,
        pm10: f64,
        no2: f64,
        o3: f64,
        co: f64,
    }

    impl StaticProvider {
        fn clean_air() -> Self {
            Self {
                pm2_5: 10.0,
                pm10: 20.0,
                no2: 10.0,
                o3: 30.0,
                co: 2.0,
            }
        }
    }

    #[async_trait]
    impl ReadingProvider for StaticProvider {
        async fn fetch_reading(&self) -> Result<Reading, IngestError> {
            Ok(Reading {
                timestamp: Utc::now(),
                pm2_5: self.pm2_5,
                pm10: self.pm10,
                no2: self.no2,
                o3: self.o3,
                co: self.co,
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ReadingProvider for FailingProvider {
        async fn fetch_reading(&self) -> Result<Reading, IngestError> {
            Err(IngestError::MissingData)
        }
    }

    #[tokio::test]
    async fn first_cycle_on_empty_stores_uses_the_naive_forecast() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let store = CsvStore::new(dir.path());
        let provider = StaticProvider::clean_air();

        let report = run_cycle(&provider, &store, &config).await.unwrap();

        assert_eq!(report.hri_actual, 34.25);
        assert_eq!(report.risk, RiskLevel::Good);
        assert_eq!(report.predicted_next, 34.25);
        assert!(report.naive_forecast);
        assert!(!report.retrained);
        assert_eq!(report.reconciled_error, None);

        let history = store.read_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].hri_actual, 34.25);

        let log = store.read_performance().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].predicted_hri, 34.25);
        assert_eq!(log[0].actual_hri, None);
        assert_eq!(log[0].error, None);
    }

    #[tokio::test]
    async fn consecutive_cycles_reconcile_and_stay_paired() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let store = CsvStore::new(dir.path());
        let provider = StaticProvider::clean_air();

        for _ in 0..5 {
            run_cycle(&provider, &store, &config).await.unwrap();
        }

        let history = store.read_history().unwrap();
        let log = store.read_performance().unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(log.len(), 5);

        // Every row but the newest has its outcome, and the stored error
        // is exactly the gap between forecast and outcome.
        for record in &log[..4] {
            let actual = record.actual_hri.unwrap();
            assert_eq!(record.error, Some((record.predicted_hri - actual).abs()));
        }
        assert!(log[4].actual_hri.is_none());
    }

    #[tokio::test]
    async fn ingest_failure_leaves_stores_untouched() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let store = CsvStore::new(dir.path());
        let good = StaticProvider::clean_air();

        run_cycle(&good, &store, &config).await.unwrap();
        run_cycle(&good, &store, &config).await.unwrap();

        let result = run_cycle(&FailingProvider, &store, &config).await;
        assert!(matches!(
            result,
            Err(PipelineError::Ingest(IngestError::MissingData))
        ));

        assert_eq!(store.read_history().unwrap().len(), 2);
        let log = store.read_performance().unwrap();
        assert_eq!(log.len(), 2);
        // The pending forecast from the second cycle is still pending.
        assert!(log[1].actual_hri.is_none());
    }

    #[tokio::test]
    async fn implausible_reading_is_rejected_before_any_write() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let store = CsvStore::new(dir.path());
        let provider = StaticProvider {
            pm2_5: -5.0,
            ..StaticProvider::clean_air()
        };

        let result = run_cycle(&provider, &store, &config).await;
        assert!(matches!(result, Err(PipelineError::Validation(_))));
        assert!(store.read_history().unwrap().is_empty());
        assert!(store.read_performance().unwrap().is_empty());
    }

    #[tokio::test]
    async fn drifted_forecast_triggers_a_retrain() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let store = CsvStore::new(dir.path());

        seed_history(&store, 60);
        store
            .append_performance(&PerformanceRecord::new(Utc::now(), 99.0))
            .unwrap();

        let provider = StaticProvider::clean_air();
        let report = run_cycle(&provider, &store, &config).await.unwrap();

        assert_eq!(report.reconciled_error, Some(64.75));
        assert!(report.retrained);
        assert!(!report.naive_forecast);
        assert!(report.predicted_next >= 0.0);
        assert!(config.model_path.exists());
    }

    #[tokio::test]
    async fn bootstrap_retrain_runs_without_any_prior_forecast() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let store = CsvStore::new(dir.path());

        seed_history(&store, 50);

        let provider = StaticProvider::clean_air();
        let report = run_cycle(&provider, &store, &config).await.unwrap();

        assert_eq!(report.reconciled_error, None);
        assert!(report.retrained);
        assert!(!report.naive_forecast);
        assert!(config.model_path.exists());
    }

    #[tokio::test]
    async fn accurate_forecasts_leave_the_model_alone() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let store = CsvStore::new(dir.path());

        seed_history(&store, 60);
        let provider = StaticProvider::clean_air();

        // First cycle bootstraps the artifact.
        let report = run_cycle(&provider, &store, &config).await.unwrap();
        assert!(report.retrained);
        let trained_at = Forecaster::load(&config.model_path)
            .unwrap()
            .unwrap()
            .trained_at();

        // Constant air keeps forecast error at zero, so no further retrain.
        let report = run_cycle(&provider, &store, &config).await.unwrap();
        assert!(!report.retrained);
        let unchanged = Forecaster::load(&config.model_path)
            .unwrap()
            .unwrap()
            .trained_at();
        assert_eq!(unchanged, trained_at);
    }

    #[tokio::test]
    async fn sqlite_backend_runs_the_same_cycle() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.storage_backend = StorageBackend::Sqlite;
        let store = open_store(config.storage_backend, &config.data_dir).unwrap();
        let provider = StaticProvider::clean_air();

        run_cycle(&provider, store.as_ref(), &config).await.unwrap();
        run_cycle(&provider, store.as_ref(), &config).await.unwrap();

        let history = store.read_history().unwrap();
        let log = store.read_performance().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].actual_hri, Some(34.25));
        assert_eq!(log[0].error, Some(0.0));
        assert!(log[1].actual_hri.is_none());
    }
}
