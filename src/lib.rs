//! airsentry: a self-correcting air-quality health risk pipeline.
//!
//! Each run fetches pollutant readings for a fixed location, derives a
//! Health Risk Index, reconciles the previous run's forecast against what
//! actually happened, retrains a gradient-boosted regressor when that
//! forecast drifted, predicts the next index, and appends everything to
//! append-only stores the dashboard reads from.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod reading;
pub mod scoring;
pub mod store;
