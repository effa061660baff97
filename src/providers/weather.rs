//! WeatherAPI client for current conditions.
//!
//! See: <https://www.weatherapi.com/docs/>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::check_status;
use super::traits::WeatherProvider;
use crate::Result;
use crate::types::{Coordinates, WeatherReading};

/// Default base URL for WeatherAPI
pub const DEFAULT_BASE_URL: &str = "http://api.weatherapi.com";

/// Client for WeatherAPI's `current.json` endpoint.
#[derive(Clone)]
pub struct WeatherApiClient {
    api_key: SecretString,
    http: Client,
    base_url: String,
}

impl WeatherApiClient {
    /// Create a new WeatherAPI client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let api_key: String = api_key.into();
        Self {
            api_key: SecretString::new(api_key.into()),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch current conditions at `coordinates`.
    ///
    /// Returns the `current` object of the response; the `location` block
    /// is discarded.
    pub async fn current(&self, coordinates: Coordinates) -> Result<WeatherReading> {
        let url = format!("{}/v1/current.json", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.expose_secret()),
                ("q", coordinates.query().as_str()),
            ])
            .send()
            .await?;

        let response = check_status(response, "WeatherAPI").await?;
        let body: CurrentResponse = response.json().await?;
        Ok(body.current)
    }
}

#[derive(Deserialize)]
struct CurrentResponse {
    current: WeatherReading,
}

#[async_trait]
impl WeatherProvider for WeatherApiClient {
    fn name(&self) -> &str {
        "weatherapi"
    }

    async fn current(&self, coordinates: Coordinates) -> Result<WeatherReading> {
        WeatherApiClient::current(self, coordinates).await
    }
}
