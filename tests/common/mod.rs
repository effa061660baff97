//! Shared fixture: a gateway wired to a wiremock upstream and an in-memory store.
#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use astrofusion::FusionGateway;
use astrofusion::auth::JwtAuthGate;
use astrofusion::clock::ManualClock;
use astrofusion::fusion::FixedSelector;
use astrofusion::gateway::TableNames;
use astrofusion::limiter::{self, RateLimitConfig};
use astrofusion::providers::{SwapiClient, WeatherApiClient};
use astrofusion::store::{Item, MemoryBackend, MemoryTable, TableSpec};

/// 2024-01-01T00:00:00Z
pub const T0: i64 = 1_704_067_200_000;

pub const WEATHER_KEY: &str = "test-weather-key";

pub struct Harness {
    pub gateway: FusionGateway,
    pub clock: ManualClock,
    pub backend: Arc<MemoryBackend>,
    pub server: MockServer,
    pub token: String,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with_rate_limit(RateLimitConfig::default()).await
    }

    pub async fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        let server = MockServer::start().await;
        let clock = ManualClock::new(T0);
        let backend = Arc::new(MemoryBackend::with_clock(Arc::new(clock.clone())));

        let gateway = FusionGateway::builder()
            .backend(backend.clone())
            .tables(TableNames::new("cache", "historial", "rate", "personal"))
            .weather(Arc::new(WeatherApiClient::with_base_url(
                WEATHER_KEY,
                server.uri(),
            )))
            .planets(Arc::new(SwapiClient::with_base_url(server.uri())))
            .jwt(JwtAuthGate::new("test-secret", Arc::new(clock.clone())).unwrap())
            .selector(Arc::new(FixedSelector(0)))
            .rate_limit(rate_limit)
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();

        let token = gateway.issue_token().unwrap();
        Self {
            gateway,
            clock,
            backend,
            server,
            token,
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn cache_table(&self) -> Arc<MemoryTable> {
        self.backend
            .memory_table(TableSpec::new("cache", "id"))
            .unwrap()
    }

    pub fn history_table(&self) -> Arc<MemoryTable> {
        self.backend
            .memory_table(TableSpec::new("historial", "id"))
            .unwrap()
    }

    pub fn rate_table(&self) -> Arc<MemoryTable> {
        self.backend.memory_table(limiter::table_spec("rate")).unwrap()
    }

    pub fn records_table(&self) -> Arc<MemoryTable> {
        self.backend
            .memory_table(TableSpec::new("personal", "id"))
            .unwrap()
    }

    /// Mount a weather response for the first candidate (Lima).
    pub async fn mock_weather(&self, current: Value, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/v1/current.json"))
            .and(query_param("key", WEATHER_KEY))
            .and(query_param("q", "-12.05,-77.05"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "location": {"name": "Lima"},
                "current": current,
            })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Mount a planet search answering `results`.
    pub async fn mock_planet_search(&self, name: &str, results: Value, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/api/planets/"))
            .and(query_param("search", name))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": results.as_array().map_or(0, Vec::len),
                "results": results,
            })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    pub async fn upstream_calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}

pub fn object(value: Value) -> Item {
    match value {
        Value::Object(item) => item,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn rainy_weather() -> Value {
    json!({
        "temp_c": 15.2,
        "condition": {"text": "Patchy rain nearby", "icon": "//cdn.weatherapi.com/weather/64x64/day/176.png", "code": 1063},
        "humidity": 82
    })
}

pub fn tatooine() -> Value {
    json!({
        "name": "Tatooine",
        "population": "200000",
        "terrain": "desert",
        "climate": "arid"
    })
}
