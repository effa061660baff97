//! Configuration loading for astrofusiond.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.astrofusion/config.toml` (user)
//! 3. `/etc/astrofusion/config.toml` (system)
//! 4. built-in defaults
//!
//! Environment variables override file values afterwards (see
//! [`Config::apply_env`]).
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.astrofusion/secrets.toml` (user, must be 0600)
//! 2. `/etc/astrofusion/secrets.toml` (system, must be 0600)

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::gateway::TableNames;
use crate::limiter::RateLimitConfig;
use crate::{AstrofusionError, Result};

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tables: TablesConfig,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8787).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8787".to_string()
}

/// Table names. All four are required by [`Config::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TablesConfig {
    #[serde(default)]
    pub cache: Option<String>,
    #[serde(default)]
    pub history: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<String>,
    #[serde(default)]
    pub records: Option<String>,
}

/// Fixed-window rate limit settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Requests per caller per window (default: 5).
    #[serde(default = "default_rate_max")]
    pub max: u32,
    /// Window length in seconds (default: 60).
    #[serde(default = "default_rate_window")]
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max: default_rate_max(),
            window_secs: default_rate_window(),
        }
    }
}

fn default_rate_max() -> u32 {
    5
}

fn default_rate_window() -> u64 {
    60
}

/// Upstream response cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Freshness window in seconds (default: 1800).
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    1800
}

/// Upstream base URLs.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_weather_url")]
    pub weather_url: String,
    #[serde(default = "default_swapi_url")]
    pub swapi_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            weather_url: default_weather_url(),
            swapi_url: default_swapi_url(),
        }
    }
}

fn default_weather_url() -> String {
    crate::providers::weather::DEFAULT_BASE_URL.to_string()
}

fn default_swapi_url() -> String {
    crate::providers::swapi::DEFAULT_BASE_URL.to_string()
}

/// Which storage backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Lmdb,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,
    /// LMDB environment directory (required for `lmdb`).
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// LMDB map size in megabytes (default: 256).
    #[serde(default = "default_map_size")]
    pub max_size_mb: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::default(),
            path: None,
            max_size_mb: default_map_size(),
        }
    }
}

fn default_map_size() -> usize {
    256
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Secrets configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub weather: Option<WeatherSecret>,
    #[serde(default)]
    pub auth: Option<AuthSecret>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherSecret {
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSecret {
    pub jwt_secret: String,
}

const WEATHER_API_KEY_ENV: &str = "WEATHER_API_KEY";
const JWT_SECRET_ENV: &str = "JWT_SECRET";

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first of the user and
    /// system files that exists is used, else the built-in defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AstrofusionError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            AstrofusionError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(AstrofusionError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".astrofusion").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/astrofusion/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`.
    ///
    /// Numeric values that do not parse are ignored, leaving the file or
    /// default value in place.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(address) = text("ASTROFUSION_ADDRESS") {
            self.server.address = address;
        }
        if let Some(name) = text("CACHE_TABLE") {
            self.tables.cache = Some(name);
        }
        if let Some(name) = text("HISTORIAL_TABLE") {
            self.tables.history = Some(name);
        }
        if let Some(name) = text("RATE_LIMIT_TABLE") {
            self.tables.rate_limit = Some(name);
        }
        if let Some(name) = text("PERSONAL_TABLE") {
            self.tables.records = Some(name);
        }
        if let Some(max) = text("RATE_LIMIT_MAX").and_then(|v| v.trim().parse().ok()) {
            self.rate_limit.max = max;
        }
        if let Some(secs) = text("RATE_LIMIT_WINDOW_SEC").and_then(|v| v.trim().parse().ok()) {
            self.rate_limit.window_secs = secs;
        }
        if let Some(secs) = text("CACHE_TTL_SECS").and_then(|v| v.trim().parse().ok()) {
            self.cache.ttl_secs = secs;
        }
    }

    /// Check that everything needed to start is present.
    pub fn validate(&self) -> Result<()> {
        let tables = [
            ("cache", &self.tables.cache),
            ("history", &self.tables.history),
            ("rate_limit", &self.tables.rate_limit),
            ("records", &self.tables.records),
        ];
        for (key, name) in tables {
            if name.as_deref().is_none_or(|n| n.trim().is_empty()) {
                return Err(AstrofusionError::Configuration(format!(
                    "tables.{key} is not configured"
                )));
            }
        }
        if self.rate_limit.window_secs == 0 {
            return Err(AstrofusionError::Configuration(
                "rate_limit.window_secs must be positive".into(),
            ));
        }
        if self.storage.backend == StorageKind::Lmdb && self.storage.path.is_none() {
            return Err(AstrofusionError::Configuration(
                "storage.path is required for the lmdb backend".into(),
            ));
        }
        Ok(())
    }

    pub fn table_names(&self) -> TableNames {
        TableNames {
            cache: self.tables.cache.clone(),
            history: self.tables.history.clone(),
            rate_limit: self.tables.rate_limit.clone(),
            records: self.tables.records.clone(),
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig::new()
            .max_requests(self.rate_limit.max)
            .window(Duration::from_secs(self.rate_limit.window_secs))
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new().ttl(Duration::from_secs(self.cache.ttl_secs))
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.astrofusion/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/astrofusion/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (env vars may still supply them).
    pub fn load() -> Result<Self> {
        // Try user secrets first
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".astrofusion").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        // Try system secrets
        let system_secrets = PathBuf::from("/etc/astrofusion/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file after checking its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            AstrofusionError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            AstrofusionError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            AstrofusionError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(AstrofusionError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// WeatherAPI key, falling back to `WEATHER_API_KEY`.
    pub fn weather_api_key(&self) -> Option<String> {
        self.weather
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(WEATHER_API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
    }

    /// Token signing secret, falling back to `JWT_SECRET`.
    pub fn jwt_secret(&self) -> Option<String> {
        self.auth
            .as_ref()
            .map(|s| s.jwt_secret.clone())
            .or_else(|| std::env::var(JWT_SECRET_ENV).ok())
            .filter(|secret| !secret.is_empty())
    }
}
