//! HTTP server for astrofusiond.
//!
//! - Configuration types (`config`)
//! - Route table and handlers (`routes`)
//! - Error to HTTP response mapping (`response`)

pub mod config;
pub mod response;
pub mod routes;

pub use config::{Config, LogFormat, Secrets, StorageKind};
pub use response::ApiError;
pub use routes::{client_identity, router};
