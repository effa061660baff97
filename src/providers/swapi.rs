//! SWAPI client for planet lookups.
//!
//! Uses the `planets/?search=` endpoint and treats the first result as the
//! match. See: <https://swapi.py4e.com/documentation>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::check_status;
use super::traits::PlanetProvider;
use crate::types::Planet;
use crate::{AstrofusionError, Result};

/// Default base URL for SWAPI
pub const DEFAULT_BASE_URL: &str = "https://swapi.py4e.com";

/// Client for the SWAPI planet catalog.
#[derive(Clone)]
pub struct SwapiClient {
    http: Client,
    base_url: String,
}

impl SwapiClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Search the catalog and return the first match.
    ///
    /// An empty `results` list is `Ok(None)`.
    pub async fn find_planet(&self, name: &str) -> Result<Option<Planet>> {
        let url = format!("{}/api/planets/", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("search", name)])
            .send()
            .await?;

        let response = check_status(response, "SWAPI").await?;
        let body: SearchResponse = response.json().await?;

        let Some(first) = body.results.into_iter().next() else {
            return Ok(None);
        };
        let planet = serde_json::from_value(first)
            .map_err(|e| AstrofusionError::UpstreamPayload(format!("SWAPI planet: {e}")))?;
        Ok(Some(planet))
    }
}

impl Default for SwapiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

#[async_trait]
impl PlanetProvider for SwapiClient {
    fn name(&self) -> &str {
        "swapi"
    }

    async fn find_planet(&self, name: &str) -> Result<Option<Planet>> {
        SwapiClient::find_planet(self, name).await
    }
}
