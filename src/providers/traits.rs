//! Provider traits for the two upstream sources.
//!
//! The fusion engine talks to upstreams only through these traits, so the
//! HTTP clients can be swapped for in-process fakes in tests.
//!
//! # Not-found vs failure
//!
//! [`PlanetProvider::find_planet`] returns `Ok(None)` when the catalog has no
//! match. That is an ordinary outcome and must stay distinct from `Err`,
//! which means the upstream call itself failed.

use async_trait::async_trait;

use crate::Result;
use crate::types::{Coordinates, Planet, WeatherReading};

/// Point-in-time weather source.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    /// Current conditions at `coordinates`. One upstream call, no retry.
    async fn current(&self, coordinates: Coordinates) -> Result<WeatherReading>;
}

/// Lookup-by-name planet catalog.
#[async_trait]
pub trait PlanetProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    /// First catalog match for `name`, or `None` when the search is empty.
    async fn find_planet(&self, name: &str) -> Result<Option<Planet>>;
}
