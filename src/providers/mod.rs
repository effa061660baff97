//! Upstream source clients.
//!
//! Two upstreams feed the fusion: WeatherAPI for current conditions and
//! SWAPI for planet attributes. Both are plain HTTP GET + JSON clients
//! built on reqwest, with a `with_base_url` constructor for pointing them
//! at a mock server.

pub mod swapi;
pub mod traits;
pub mod weather;

pub use swapi::SwapiClient;
pub use traits::{PlanetProvider, WeatherProvider};
pub use weather::WeatherApiClient;

use crate::{AstrofusionError, Result};

/// Pass 2xx responses through; map anything else to [`AstrofusionError::Api`].
///
/// The upstream's own error text, when readable, is kept in the message.
pub(crate) async fn check_status(
    response: reqwest::Response,
    upstream: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = body.trim();
    let message = if detail.is_empty() {
        format!("{upstream} API error: {status}")
    } else {
        format!("{upstream} API error: {status}: {detail}")
    };
    Err(AstrofusionError::Api {
        status: status.as_u16(),
        message,
    })
}
