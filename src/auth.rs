//! Bearer-token auth gate.
//!
//! The fusion pipeline only sees [`AuthGate`]: hand it the raw
//! `Authorization` header, get back valid or invalid plus a caller-facing
//! reason. [`JwtAuthGate`] is the shipped implementation (HS256 tokens
//! issued by `/generate-token`).
//!
//! Token time validation uses the injected [`Clock`] rather than
//! `jsonwebtoken`'s own, so expiry is deterministic under test.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::{AstrofusionError, Result};

/// Shown when the header is absent or not a bearer credential.
pub const MISSING_TOKEN_MESSAGE: &str =
    "Debes consumir primero el endpoint /generate-token para obtener un token válido.";

/// Shown when the bearer token fails verification.
pub const INVALID_TOKEN_MESSAGE: &str = "Token inválido. Solicita uno nuevo en /generate-token.";

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Outcome of an auth check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthVerdict {
    pub valid: bool,
    pub message: Option<String>,
}

impl AuthVerdict {
    pub fn valid() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }
}

/// Accepts or rejects a request credential.
pub trait AuthGate: Send + Sync {
    /// Check the raw `Authorization` header value, if any.
    fn verify(&self, authorization: Option<&str>) -> AuthVerdict;
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user: String,
    /// Issued-at, Unix epoch seconds.
    pub iat: i64,
    /// Expiry, Unix epoch seconds.
    pub exp: i64,
}

/// HS256 JWT gate.
pub struct JwtAuthGate {
    secret: SecretString,
    token_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtAuthGate {
    /// Create a gate for `secret`. Empty secrets are rejected.
    pub fn new(secret: impl Into<String>, clock: Arc<dyn Clock>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AstrofusionError::Configuration(
                "jwt secret must not be empty".into(),
            ));
        }
        Ok(Self {
            secret: SecretString::new(secret.into()),
            token_ttl: DEFAULT_TOKEN_TTL,
            clock,
        })
    }

    /// Gate with a random per-process secret. Tokens die with the process.
    pub fn ephemeral(clock: Arc<dyn Clock>) -> Self {
        let secret: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect();
        Self {
            secret: SecretString::new(secret.into()),
            token_ttl: DEFAULT_TOKEN_TTL,
            clock,
        }
    }

    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Sign a token for the demo user, valid for the configured lifetime.
    pub fn issue_token(&self) -> Result<String> {
        let iat = self.clock.now_secs();
        let claims = Claims {
            user: "demo".to_string(),
            iat,
            exp: iat + i64::try_from(self.token_ttl.as_secs()).unwrap_or(i64::MAX / 2),
        };
        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        encode(&Header::new(Algorithm::HS256), &claims, &key)
            .map_err(|e| AstrofusionError::Configuration(format!("failed to sign token: {e}")))
    }

    /// Verify signature and expiry, returning the claims.
    pub fn decode_token(&self, token: &str) -> Option<Claims> {
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        let claims = decode::<Claims>(token, &key, &validation).ok()?.claims;
        (claims.exp > self.clock.now_secs()).then_some(claims)
    }
}

impl AuthGate for JwtAuthGate {
    fn verify(&self, authorization: Option<&str>) -> AuthVerdict {
        let Some(token) = authorization.and_then(|h| h.strip_prefix("Bearer ")) else {
            return AuthVerdict::invalid(MISSING_TOKEN_MESSAGE);
        };
        match self.decode_token(token.trim()) {
            Some(_) => AuthVerdict::valid(),
            None => AuthVerdict::invalid(INVALID_TOKEN_MESSAGE),
        }
    }
}
