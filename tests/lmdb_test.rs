//! The pipeline over the durable LMDB backend.
#![cfg(feature = "lmdb")]

mod common;

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use astrofusion::FusionGateway;
use astrofusion::auth::JwtAuthGate;
use astrofusion::clock::ManualClock;
use astrofusion::fusion::FixedSelector;
use astrofusion::gateway::TableNames;
use astrofusion::providers::{SwapiClient, WeatherApiClient};
use astrofusion::store::LmdbBackend;

use common::{Harness, T0, WEATHER_KEY, rainy_weather, tatooine};

fn lmdb_gateway(dir: &Path, upstream: &str, clock: &ManualClock) -> FusionGateway {
    let backend = LmdbBackend::open_with_clock(dir, 16, Arc::new(clock.clone())).unwrap();
    FusionGateway::builder()
        .backend(Arc::new(backend))
        .tables(TableNames::new("cache", "historial", "rate", "personal"))
        .weather(Arc::new(WeatherApiClient::with_base_url(WEATHER_KEY, upstream)))
        .planets(Arc::new(SwapiClient::with_base_url(upstream)))
        .jwt(JwtAuthGate::new("test-secret", Arc::new(clock.clone())).unwrap())
        .selector(Arc::new(FixedSelector(0)))
        .clock(Arc::new(clock.clone()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn cache_and_history_survive_restart() {
    // the harness only supplies the mock upstream here
    let h = Harness::start().await;
    h.mock_weather(rainy_weather(), 1).await;
    h.mock_planet_search("Tatooine", json!([tatooine()]), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);

    {
        let gateway = lmdb_gateway(dir.path(), &h.server.uri(), &clock);
        let token = gateway.issue_token().unwrap();
        gateway
            .fuse(None, Some(&format!("Bearer {token}")), "1.2.3.4")
            .await
            .unwrap();
    }

    clock.advance_millis(1_000);
    let gateway = lmdb_gateway(dir.path(), &h.server.uri(), &clock);
    let token = gateway.issue_token().unwrap();
    let fusion = gateway
        .fuse(None, Some(&format!("Bearer {token}")), "1.2.3.4")
        .await
        .unwrap();

    assert_eq!(fusion.planeta, "Tatooine");
    assert_eq!(h.upstream_calls().await, 2);

    let page = gateway.history().list(10, None).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.items[0].fecha > page.items[1].fecha);
}

#[tokio::test]
async fn rate_limit_counts_persist_across_restart() {
    let h = Harness::start().await;
    h.mock_weather(rainy_weather(), 1).await;
    h.mock_planet_search("Tatooine", json!([tatooine()]), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);

    for _ in 0..5 {
        let gateway = lmdb_gateway(dir.path(), &h.server.uri(), &clock);
        let token = gateway.issue_token().unwrap();
        gateway
            .fuse(None, Some(&format!("Bearer {token}")), "1.2.3.4")
            .await
            .unwrap();
    }

    let gateway = lmdb_gateway(dir.path(), &h.server.uri(), &clock);
    let token = gateway.issue_token().unwrap();
    let err = gateway
        .fuse(None, Some(&format!("Bearer {token}")), "1.2.3.4")
        .await
        .unwrap_err();
    assert!(matches!(err, astrofusion::AstrofusionError::RateLimited));
}
