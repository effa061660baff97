//! HTTP mapping of pipeline outcomes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::AstrofusionError;
use crate::types::FusionResult;

pub const RATE_LIMITED_MESSAGE: &str = "Demasiadas solicitudes. Intenta nuevamente en un momento.";
pub const NOT_FOUND_MESSAGE: &str = "Planeta no encontrado";
pub const INTERNAL_ERROR_MESSAGE: &str = "Error interno";

/// Successful fusion body.
#[derive(Debug, Serialize)]
pub struct FusionBody {
    pub source: &'static str,
    pub data: FusionResult,
}

impl FusionBody {
    pub fn new(data: FusionResult) -> Self {
        Self {
            source: "fusion",
            data,
        }
    }
}

/// Error wrapper that renders as `{message[, error]}` with the right status.
#[derive(Debug)]
pub struct ApiError(pub AstrofusionError);

impl From<AstrofusionError> for ApiError {
    fn from(err: AstrofusionError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            AstrofusionError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AstrofusionError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AstrofusionError::NotFound(_) => StatusCode::NOT_FOUND,
            AstrofusionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self.0 {
            AstrofusionError::Unauthorized(message) | AstrofusionError::InvalidInput(message) => {
                json!({ "message": message })
            }
            AstrofusionError::RateLimited => json!({ "message": RATE_LIMITED_MESSAGE }),
            AstrofusionError::NotFound(_) => json!({ "message": NOT_FOUND_MESSAGE }),
            err => {
                error!(error = %err, "request failed");
                json!({ "message": INTERNAL_ERROR_MESSAGE, "error": err.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (AstrofusionError::Unauthorized("x".into()), 401),
            (AstrofusionError::RateLimited, 429),
            (AstrofusionError::NotFound("Krypton".into()), 404),
            (AstrofusionError::InvalidInput("x".into()), 400),
            (AstrofusionError::Storage("disk".into()), 500),
            (
                AstrofusionError::Api {
                    status: 503,
                    message: "down".into(),
                },
                500,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status_code().as_u16(), status);
        }
    }
}
