//! HTTP surface tests driven through the axum router with `tower::ServiceExt`.
#![cfg(feature = "server")]

mod common;

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;

use astrofusion::server::router;

use common::{Harness, rainy_weather, tatooine};

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header("x-forwarded-for", "203.0.113.7");
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, bearer);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn fusionados_returns_fusion_envelope() {
    let h = Harness::start().await;
    h.mock_weather(rainy_weather(), 1).await;
    h.mock_planet_search("Tatooine", json!([tatooine()]), 1).await;
    let bearer = h.bearer();
    let app = router(Arc::new(h.gateway));

    let response = app
        .oneshot(get("/fusionados?planet=Tatooine", Some(&bearer)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["source"], "fusion");
    assert_eq!(body["data"]["planeta"], "Tatooine");
    assert_eq!(body["data"]["clima"]["temp_c"], json!(15.2));
}

#[tokio::test]
async fn fusionados_without_token_is_401() {
    let h = Harness::start().await;
    let app = router(Arc::new(h.gateway));

    let response = app.oneshot(get("/fusionados", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"message": "Debes consumir primero el endpoint /generate-token para obtener un token válido."})
    );
}

#[tokio::test]
async fn sixth_request_in_window_is_429() {
    let h = Harness::start().await;
    h.mock_weather(rainy_weather(), 1).await;
    h.mock_planet_search("Tatooine", json!([tatooine()]), 1).await;
    let bearer = h.bearer();
    let app = router(Arc::new(h.gateway));

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(get("/fusionados", Some(&bearer)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.oneshot(get("/fusionados", Some(&bearer))).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body_json(response).await,
        json!({"message": "Demasiadas solicitudes. Intenta nuevamente en un momento."})
    );
}

#[tokio::test]
async fn unknown_planet_is_404() {
    let h = Harness::start().await;
    h.mock_weather(rainy_weather(), 1).await;
    h.mock_planet_search("Krypton", json!([]), 1).await;
    let bearer = h.bearer();
    let app = router(Arc::new(h.gateway));

    let response = app
        .oneshot(get("/fusionados?planet=Krypton", Some(&bearer)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({"message": "Planeta no encontrado"}));
}

#[tokio::test]
async fn upstream_failure_is_500_with_detail() {
    let h = Harness::start().await;
    h.mock_weather(json!({"no_temp": true}), 1).await;
    let bearer = h.bearer();
    let app = router(Arc::new(h.gateway));

    let response = app.oneshot(get("/fusionados", Some(&bearer))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Error interno");
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn generated_token_unlocks_fusion() {
    let h = Harness::start().await;
    h.mock_weather(rainy_weather(), 1).await;
    h.mock_planet_search("Tatooine", json!([tatooine()]), 1).await;
    let app = router(Arc::new(h.gateway));

    let response = app.clone().oneshot(get("/generate-token", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get("/fusionados", Some(&format!("Bearer {token}"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn almacenar_stores_attribute_bag() {
    let h = Harness::start().await;
    let records = h.records_table();
    let app = router(Arc::new(h.gateway));

    let response = app
        .oneshot(post(
            "/almacenar",
            r#"{"nombre":"Halcón Milenario","descripcion":"carguero","velocidad":"0.5 past light speed"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Elemento almacenado exitosamente");
    assert_eq!(body["item"]["nombre"], "Halcón Milenario");
    assert_eq!(body["item"]["velocidad"], "0.5 past light speed");
    assert_eq!(body["item"]["creadoEn"], "2024-01-01T00:00:00+00:00");

    let stored = records.items().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(Value::Object(stored[0].clone()), body["item"]);
}

#[tokio::test]
async fn almacenar_validation_errors_are_400() {
    let h = Harness::start().await;
    let records = h.records_table();
    let app = router(Arc::new(h.gateway));

    let cases = [
        ("", "Cuerpo vacío"),
        ("not json", "Cuerpo inválido"),
        (r#"{"nombre":"X"}"#, "Faltan campos obligatorios: nombre y descripción"),
        (r#"{"descripcion":"Y"}"#, "Faltan campos obligatorios: nombre y descripción"),
    ];
    for (body, message) in cases {
        let response = app.clone().oneshot(post("/almacenar", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(body_json(response).await["message"], message);
    }
    assert!(records.is_empty().await);
}

#[tokio::test]
async fn historial_pages_newest_first() {
    let h = Harness::start().await;
    h.mock_weather(rainy_weather(), 1).await;
    h.mock_planet_search("Tatooine", json!([tatooine()]), 1).await;
    for i in 0..3 {
        h.clock.set(common::T0 + i * 1_000);
        h.gateway
            .fuse(None, Some(&h.bearer()), "1.2.3.4")
            .await
            .unwrap();
    }
    let app = router(Arc::new(h.gateway));

    let response = app
        .clone()
        .oneshot(get("/historial?limit=2", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    let items = first["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0]["fecha"].as_str() >= items[1]["fecha"].as_str());
    let token = first["nextPageToken"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/historial?limit=2&lastKey={token}"), None))
        .await
        .unwrap();
    let second = body_json(response).await;
    assert_eq!(second["items"].as_array().unwrap().len(), 1);
    assert_eq!(second["nextPageToken"], Value::Null);

    let response = app
        .oneshot(get("/historial?lastKey=%5Bbroken", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
