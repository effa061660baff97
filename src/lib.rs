//! Astrofusion - planet and weather fusion gateway
//!
//! This crate fuses two independently sourced facts into one response:
//! current weather at a sampled coordinate (WeatherAPI) and the attributes
//! of a named planet (SWAPI). Upstream responses are kept in a TTL cache,
//! callers are rate limited per fixed window, and every successful fusion
//! is appended to a history table.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use astrofusion::auth::JwtAuthGate;
//! use astrofusion::clock::SystemClock;
//! use astrofusion::gateway::TableNames;
//! use astrofusion::providers::{SwapiClient, WeatherApiClient};
//! use astrofusion::FusionGateway;
//!
//! #[tokio::main]
//! async fn main() -> astrofusion::Result<()> {
//!     let gateway = FusionGateway::builder()
//!         .tables(TableNames::new("cache", "historial", "rate", "personal"))
//!         .weather(Arc::new(WeatherApiClient::new("weather-api-key")))
//!         .planets(Arc::new(SwapiClient::new()))
//!         .jwt(JwtAuthGate::new("jwt-secret", Arc::new(SystemClock))?)
//!         .build()?;
//!
//!     let token = gateway.issue_token()?;
//!     let fusion = gateway
//!         .fuse(Some("Alderaan"), Some(&format!("Bearer {token}")), "127.0.0.1")
//!         .await?;
//!
//!     println!("{} at {}: {}", fusion.planeta, fusion.coordenadas.query(), fusion.clima.condition);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod clock;
pub mod error;
pub mod fusion;
pub mod gateway;
pub mod history;
pub mod limiter;
pub mod providers;
pub mod records;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use error::{AstrofusionError, Result};
pub use gateway::{FusionGateway, FusionGatewayBuilder};
pub use types::{Clima, Coordinates, FusionResult, HistoryRecord, Planet, WeatherReading};
pub use version::{PKG_VERSION, version_string};
