use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;

use super::ReadingProvider;
use crate::error::IngestError;
use crate::reading::Reading;

const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org";

/// The endpoint reports CO in ug/m3; readings carry mg/m3.
const MICROGRAMS_PER_MILLIGRAM: f64 = 1000.0;

/// OpenWeatherMap air pollution endpoint for a fixed location.
pub struct OpenWeatherProvider {
    client: Client,
    base_url: String,
    api_key: String,
    latitude: f64,
    longitude: f64,
}

impl OpenWeatherProvider {
    pub fn new(
        api_key: String,
        latitude: f64,
        longitude: f64,
        timeout: Duration,
    ) -> Result<Self, IngestError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            latitude,
            longitude,
        })
    }

    /// Point the provider at a different host. Used by tests against a
    /// local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ReadingProvider for OpenWeatherProvider {
    async fn fetch_reading(&self) -> Result<Reading, IngestError> {
        // The URL embeds the credential, so it must never be logged.
        let url = format!(
            "{}/data/2.5/air_pollution?lat={}&lon={}&appid={}",
            self.base_url, self.latitude, self.longitude, self.api_key
        );
        debug!(
            "fetching air pollution data for ({:.4}, {:.4})",
            self.latitude, self.longitude
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(IngestError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let payload: AirPollutionResponse = response.json().await?;
        let entry = payload
            .list
            .into_iter()
            .next()
            .ok_or(IngestError::MissingData)?;
        info!(
            "provider reports AQI band {} at ({:.4}, {:.4})",
            entry.main.aqi, self.latitude, self.longitude
        );

        let c = entry.components;
        Ok(Reading {
            timestamp: Utc::now(),
            pm2_5: c.pm2_5,
            pm10: c.pm10,
            no2: c.no2,
            o3: c.o3,
            co: c.co / MICROGRAMS_PER_MILLIGRAM,
        })
    }
}

/// Wire shape of the air_pollution endpoint. Components the provider omits
/// deserialize to zero, which validation then rejects as implausible.
#[derive(Debug, Deserialize)]
struct AirPollutionResponse {
    #[serde(default)]
    list: Vec<PollutionEntry>,
}

#[derive(Debug, Deserialize)]
struct PollutionEntry {
    main: AqiBand,
    components: Components,
}

#[derive(Debug, Deserialize)]
struct AqiBand {
    aqi: u8,
}

#[derive(Debug, Deserialize)]
struct Components {
    #[serde(default)]
    pm2_5: f64,
    #[serde(default)]
    pm10: f64,
    #[serde(default)]
    no2: f64,
    #[serde(default)]
    o3: f64,
    #[serde(default)]
    co: f64,
}
