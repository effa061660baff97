//! The fusion pipeline.
//!
//! [`FusionGateway`] runs every fusion request through the same sequential
//! chain: auth gate, rate limiter, fusion engine, history append. Each step
//! only runs if the previous one passed; a rejected credential leaves the
//! store untouched.

mod builder;

pub use builder::{FusionGatewayBuilder, TableNames};

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::auth::{AuthGate, JwtAuthGate};
use crate::fusion::{FusionEngine, FusionOutcome};
use crate::history::HistoryRecorder;
use crate::limiter::{RateDecision, RateLimiter};
use crate::records::RecordStore;
use crate::telemetry;
use crate::types::FusionResult;
use crate::{AstrofusionError, Result};

/// Planet fused when the caller names none.
pub const DEFAULT_PLANET: &str = "Tatooine";

/// Identity used when the caller's address cannot be determined.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Fully wired fusion service. Build once per process and share.
pub struct FusionGateway {
    auth: Arc<dyn AuthGate>,
    tokens: Option<Arc<JwtAuthGate>>,
    limiter: RateLimiter,
    engine: FusionEngine,
    history: HistoryRecorder,
    records: RecordStore,
}

impl FusionGateway {
    pub fn builder() -> FusionGatewayBuilder {
        FusionGatewayBuilder::new()
    }

    /// Run one fusion request.
    ///
    /// `planet` falls back to [`DEFAULT_PLANET`] when absent or empty.
    /// Rejections come back as errors: [`AstrofusionError::Unauthorized`],
    /// [`AstrofusionError::RateLimited`] and [`AstrofusionError::NotFound`].
    #[instrument(skip(self, authorization), fields(operation = "fuse"))]
    pub async fn fuse(
        &self,
        planet: Option<&str>,
        authorization: Option<&str>,
        identity: &str,
    ) -> Result<FusionResult> {
        let result = self.run(planet, authorization, identity).await;
        metrics::counter!(telemetry::REQUESTS_TOTAL, "outcome" => outcome_label(&result))
            .increment(1);
        result
    }

    async fn run(
        &self,
        planet: Option<&str>,
        authorization: Option<&str>,
        identity: &str,
    ) -> Result<FusionResult> {
        let verdict = self.auth.verify(authorization);
        if !verdict.valid {
            let message = verdict.message.unwrap_or_default();
            warn!(identity, reason = %message, "request rejected by auth gate");
            return Err(AstrofusionError::Unauthorized(message));
        }

        if let RateDecision::Limited = self.limiter.check_and_consume(identity).await? {
            return Err(AstrofusionError::RateLimited);
        }

        let planet = planet
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_PLANET);

        let fusion = match self.engine.fuse(planet).await? {
            FusionOutcome::Fused(fusion) => fusion,
            FusionOutcome::PlanetNotFound { planet } => {
                return Err(AstrofusionError::NotFound(planet));
            }
        };

        self.history.append(&fusion).await?;
        info!(planeta = %fusion.planeta, "fusion served");
        Ok(fusion)
    }

    /// Issue a bearer token, if this gateway signs its own.
    pub fn issue_token(&self) -> Result<String> {
        self.tokens
            .as_ref()
            .ok_or_else(|| {
                AstrofusionError::Configuration("token issuance is not configured".into())
            })?
            .issue_token()
    }

    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }
}

fn outcome_label(result: &Result<FusionResult>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(AstrofusionError::Unauthorized(_)) => "unauthorized",
        Err(AstrofusionError::RateLimited) => "limited",
        Err(AstrofusionError::NotFound(_)) => "not_found",
        Err(_) => "error",
    }
}
