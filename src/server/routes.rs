//! HTTP routes.
//!
//! | route | purpose |
//! |---|---|
//! | `GET /fusionados?planet=` | the fusion pipeline |
//! | `GET /generate-token` | issue a bearer token |
//! | `POST /almacenar` | store a free-form record |
//! | `GET /historial?limit=&lastKey=` | page through fusion history |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use super::response::{ApiError, FusionBody};
use crate::gateway::{FusionGateway, UNKNOWN_IDENTITY};
use crate::history::DEFAULT_PAGE_SIZE;

const STORED_MESSAGE: &str = "Elemento almacenado exitosamente";

/// Build the service router around a shared gateway.
pub fn router(gateway: Arc<FusionGateway>) -> Router {
    Router::new()
        .route("/fusionados", get(fusionados))
        .route("/generate-token", get(generate_token))
        .route("/almacenar", post(almacenar))
        .route("/historial", get(historial))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

#[derive(Debug, Deserialize)]
struct FusionQuery {
    planet: Option<String>,
}

async fn fusionados(
    State(gateway): State<Arc<FusionGateway>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<FusionQuery>,
) -> Result<Json<FusionBody>, ApiError> {
    let identity = client_identity(&headers, peer.map(|ConnectInfo(addr)| addr));
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let fusion = gateway
        .fuse(query.planet.as_deref(), authorization, &identity)
        .await?;
    Ok(Json(FusionBody::new(fusion)))
}

async fn generate_token(State(gateway): State<Arc<FusionGateway>>) -> Result<Response, ApiError> {
    let token = gateway.issue_token()?;
    Ok(Json(json!({ "token": token })).into_response())
}

async fn almacenar(
    State(gateway): State<Arc<FusionGateway>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let item = gateway.records().store_body(&body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": STORED_MESSAGE, "item": item })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<String>,
    #[serde(rename = "lastKey")]
    last_key: Option<String>,
}

async fn historial(
    State(gateway): State<Arc<FusionGateway>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let limit = query
        .limit
        .as_deref()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE);
    let last_key = query.last_key.as_deref().filter(|k| !k.is_empty());

    let page = gateway.history().list(limit, last_key).await?;
    Ok(Json(page).into_response())
}

/// Caller identity for rate limiting.
///
/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header_value("x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header_value("x-real-ip") {
        return real_ip.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn identity_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_identity(&headers, None), "203.0.113.7");
    }

    #[test]
    fn identity_falls_back_through_real_ip_and_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_identity(&headers, None), "198.51.100.2");

        let peer: SocketAddr = "192.0.2.9:5555".parse().unwrap();
        assert_eq!(client_identity(&HeaderMap::new(), Some(peer)), "192.0.2.9");
        assert_eq!(client_identity(&HeaderMap::new(), None), "unknown");
    }
}
