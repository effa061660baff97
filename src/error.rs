//! Astrofusion error types

/// Astrofusion error types
#[derive(Debug, thiserror::Error)]
pub enum AstrofusionError {
    // Gate errors
    /// The auth gate rejected the credential. The message is shown to the caller verbatim.
    #[error("{0}")]
    Unauthorized(String),

    #[error("rate limited")]
    RateLimited,

    #[error("not found: {0}")]
    NotFound(String),

    // Upstream errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Upstream answered 2xx but the body did not have the expected shape.
    #[error("unexpected upstream payload: {0}")]
    UpstreamPayload(String),

    // Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AstrofusionError {
    /// Whether this error came from one of the upstream sources.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Api { .. } | Self::UpstreamPayload(_)
        )
    }

    /// Whether this error surfaces as the generic internal-error outcome.
    ///
    /// Gate outcomes, not-found and caller input errors have their own
    /// responses; everything else collapses into "Error interno".
    pub fn is_internal(&self) -> bool {
        !matches!(
            self,
            Self::Unauthorized(_) | Self::RateLimited | Self::NotFound(_) | Self::InvalidInput(_)
        )
    }
}

impl From<reqwest::Error> for AstrofusionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AstrofusionError::UpstreamPayload(err.to_string())
        } else {
            AstrofusionError::Http(err.to_string())
        }
    }
}

#[cfg(feature = "lmdb")]
impl From<heed::Error> for AstrofusionError {
    fn from(err: heed::Error) -> Self {
        AstrofusionError::Storage(err.to_string())
    }
}

/// Result type alias for Astrofusion operations
pub type Result<T> = std::result::Result<T, AstrofusionError>;
