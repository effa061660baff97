//! Cache-or-fetch resolution of both sources and the merge.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::coordinates::{CANDIDATE_COORDINATES, CoordinateSelector, RandomSelector};
use crate::cache::{CacheConfig, CacheStore};
use crate::clock::Clock;
use crate::providers::{PlanetProvider, WeatherProvider};
use crate::telemetry;
use crate::types::{Coordinates, FusionResult, Planet, WeatherReading};
use crate::{AstrofusionError, Result};

const WEATHER_SOURCE: &str = "weather";
const SWAPI_SOURCE: &str = "swapi";

/// Cache key for weather sampled at candidate `index`.
pub fn weather_cache_key(index: usize) -> String {
    format!("weather#{index}")
}

/// Cache key for the planet named `name`.
pub fn planet_cache_key(name: &str) -> String {
    format!("swapi#{name}")
}

/// What a fusion attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FusionOutcome {
    Fused(FusionResult),
    /// The catalog has no planet by that name. Nothing was cached for it.
    PlanetNotFound { planet: String },
}

/// Resolves weather then planet, each from cache when fresh, and merges them.
pub struct FusionEngine {
    weather: Arc<dyn WeatherProvider>,
    planets: Arc<dyn PlanetProvider>,
    cache: CacheStore,
    cache_config: CacheConfig,
    selector: Arc<dyn CoordinateSelector>,
    candidates: Vec<Coordinates>,
    clock: Arc<dyn Clock>,
}

impl FusionEngine {
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        planets: Arc<dyn PlanetProvider>,
        cache: CacheStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            weather,
            planets,
            cache,
            cache_config: CacheConfig::default(),
            selector: Arc::new(RandomSelector),
            candidates: CANDIDATE_COORDINATES.to_vec(),
            clock,
        }
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn selector(mut self, selector: Arc<dyn CoordinateSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Replace the candidate sampling points. Must not be empty.
    pub fn candidates(mut self, candidates: Vec<Coordinates>) -> Result<Self> {
        if candidates.is_empty() {
            return Err(AstrofusionError::Configuration(
                "coordinate candidate list must not be empty".into(),
            ));
        }
        self.candidates = candidates;
        Ok(self)
    }

    /// Fuse current weather at a sampled coordinate with the planet `name`.
    ///
    /// Weather is resolved first. Upstream failures and not-found results
    /// are never cached.
    pub async fn fuse(&self, name: &str) -> Result<FusionOutcome> {
        let last = self.candidates.len() - 1;
        let index = self.selector.select(self.candidates.len()).min(last);
        let coordinates = self.candidates[index];

        let weather = self.resolve_weather(index, coordinates).await?;
        let Some(planet) = self.resolve_planet(name).await? else {
            debug!(planet = name, "planet not found");
            return Ok(FusionOutcome::PlanetNotFound {
                planet: name.to_string(),
            });
        };

        Ok(FusionOutcome::Fused(FusionResult::merge(
            &planet,
            &weather,
            coordinates,
        )))
    }

    async fn resolve_weather(
        &self,
        index: usize,
        coordinates: Coordinates,
    ) -> Result<WeatherReading> {
        let key = weather_cache_key(index);
        if let Some(reading) = self.cached(&key, WEATHER_SOURCE).await? {
            return Ok(reading);
        }

        let reading = observe_upstream(
            WEATHER_SOURCE,
            self.weather.name(),
            self.weather.current(coordinates),
        )
        .await?;
        self.store(&key, &reading).await?;
        Ok(reading)
    }

    async fn resolve_planet(&self, name: &str) -> Result<Option<Planet>> {
        let key = planet_cache_key(name);
        if let Some(planet) = self.cached(&key, SWAPI_SOURCE).await? {
            return Ok(Some(planet));
        }

        let planet = observe_upstream(
            SWAPI_SOURCE,
            self.planets.name(),
            self.planets.find_planet(name),
        )
        .await?;
        if let Some(planet) = &planet {
            self.store(&key, planet).await?;
        }
        Ok(planet)
    }

    /// Fresh cached payload under `key`, decoded. Stale, absent and
    /// undecodable entries all count as a miss.
    async fn cached<T: DeserializeOwned>(
        &self,
        key: &str,
        source: &'static str,
    ) -> Result<Option<T>> {
        let now = self.clock.now_millis();
        let fresh = self
            .cache
            .get(key)
            .await?
            .filter(|entry| entry.is_fresh(now, self.cache_config.ttl_millis()));

        let decoded = fresh.and_then(|entry| match serde_json::from_value(entry.data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "ignoring undecodable cache entry");
                None
            }
        });

        if decoded.is_some() {
            debug!(key, "cache hit");
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "source" => source).increment(1);
        } else {
            debug!(key, "cache miss");
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "source" => source).increment(1);
        }
        Ok(decoded)
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let data: Value = serde_json::to_value(value)?;
        self.cache.put(key, data).await?;
        Ok(())
    }
}

/// Await one upstream call, recording its outcome and duration.
async fn observe_upstream<T>(
    source: &'static str,
    provider: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    let start = Instant::now();
    let result = call.await;
    let elapsed = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(telemetry::UPSTREAM_REQUESTS_TOTAL,
        "source" => source,
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::UPSTREAM_DURATION_SECONDS, "source" => source).record(elapsed);

    if let Err(e) = &result {
        warn!(source, provider, error = %e, "upstream call failed");
    }
    result
}
