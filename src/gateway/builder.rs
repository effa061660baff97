//! Builder for configuring gateway instances

use std::sync::Arc;

use super::FusionGateway;
use crate::auth::{AuthGate, JwtAuthGate};
use crate::cache::{CacheConfig, CacheStore};
use crate::clock::{Clock, SystemClock};
use crate::fusion::{CoordinateSelector, FusionEngine};
use crate::history::HistoryRecorder;
use crate::limiter::{RateLimitConfig, RateLimiter};
use crate::providers::{PlanetProvider, WeatherProvider};
use crate::records::RecordStore;
use crate::store::{MemoryBackend, StorageBackend, TableSpec};
use crate::types::Coordinates;
use crate::{AstrofusionError, Result};

/// Names of the four tables the gateway uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableNames {
    pub cache: Option<String>,
    pub history: Option<String>,
    pub rate_limit: Option<String>,
    pub records: Option<String>,
}

impl TableNames {
    /// All four tables named, e.g. for tests.
    pub fn new(
        cache: impl Into<String>,
        history: impl Into<String>,
        rate_limit: impl Into<String>,
        records: impl Into<String>,
    ) -> Self {
        Self {
            cache: Some(cache.into()),
            history: Some(history.into()),
            rate_limit: Some(rate_limit.into()),
            records: Some(records.into()),
        }
    }
}

/// Builder for [`FusionGateway`].
///
/// Storage defaults to an in-memory backend and the clock to the system
/// clock. Both upstream providers, an auth gate and all table names must
/// be supplied.
pub struct FusionGatewayBuilder {
    backend: Option<Arc<dyn StorageBackend>>,
    tables: TableNames,
    weather: Option<Arc<dyn WeatherProvider>>,
    planets: Option<Arc<dyn PlanetProvider>>,
    auth: Option<Arc<dyn AuthGate>>,
    tokens: Option<Arc<JwtAuthGate>>,
    rate_limit: RateLimitConfig,
    cache: CacheConfig,
    selector: Option<Arc<dyn CoordinateSelector>>,
    candidates: Option<Vec<Coordinates>>,
    clock: Option<Arc<dyn Clock>>,
}

impl FusionGatewayBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            tables: TableNames::default(),
            weather: None,
            planets: None,
            auth: None,
            tokens: None,
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            selector: None,
            candidates: None,
            clock: None,
        }
    }

    /// Storage backend shared by every table.
    pub fn backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }

    pub fn weather(mut self, provider: Arc<dyn WeatherProvider>) -> Self {
        self.weather = Some(provider);
        self
    }

    pub fn planets(mut self, provider: Arc<dyn PlanetProvider>) -> Self {
        self.planets = Some(provider);
        self
    }

    /// Use a JWT gate for both verification and `/generate-token`.
    pub fn jwt(mut self, gate: JwtAuthGate) -> Self {
        let gate = Arc::new(gate);
        self.auth = Some(gate.clone());
        self.tokens = Some(gate);
        self
    }

    /// Use an external gate. Token issuance stays disabled.
    pub fn auth_gate(mut self, gate: Arc<dyn AuthGate>) -> Self {
        self.auth = Some(gate);
        self.tokens = None;
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn selector(mut self, selector: Arc<dyn CoordinateSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn candidates(mut self, candidates: Vec<Coordinates>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Clock for cache freshness, rate windows, tokens and timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<FusionGateway> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::with_clock(clock.clone())));

        let weather = self.weather.ok_or_else(|| missing("weather provider"))?;
        let planets = self.planets.ok_or_else(|| missing("planet provider"))?;
        let auth = self.auth.ok_or_else(|| missing("auth gate"))?;

        let limiter = RateLimiter::open(
            backend.as_ref(),
            self.tables.rate_limit.as_deref(),
            self.rate_limit,
            clock.clone(),
        )?;

        let cache_table = required(&self.tables.cache, "cache")?;
        let cache = CacheStore::new(
            backend.open_table(TableSpec::new(cache_table, "id"))?,
            clock.clone(),
        );

        let mut engine = FusionEngine::new(weather, planets, cache, clock.clone())
            .cache_config(self.cache);
        if let Some(selector) = self.selector {
            engine = engine.selector(selector);
        }
        if let Some(candidates) = self.candidates {
            engine = engine.candidates(candidates)?;
        }

        let history = HistoryRecorder::open(
            backend.as_ref(),
            required(&self.tables.history, "history")?,
            clock.clone(),
        )?;
        let records = RecordStore::open(
            backend.as_ref(),
            required(&self.tables.records, "records")?,
            clock,
        )?;

        Ok(FusionGateway {
            auth,
            tokens: self.tokens,
            limiter,
            engine,
            history,
            records,
        })
    }
}

impl Default for FusionGatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(what: &str) -> AstrofusionError {
    AstrofusionError::Configuration(format!("no {what} configured"))
}

fn required<'a>(name: &'a Option<String>, table: &str) -> Result<&'a str> {
    name.as_deref()
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AstrofusionError::Configuration(format!("{table} table is not configured")))
}
