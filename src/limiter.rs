//! Per-caller fixed-window rate limiting.
//!
//! Time is cut into non-overlapping windows of `window` length. Each
//! (caller, window) pair gets its own counter record keyed
//! `"<identity>#<bucket>"`, where `bucket = floor(now_ms / window_ms)`, so a
//! new window starts from an implicit count of zero without any reset write.
//! Records carry a `ttl` expiry attribute, the end of their window rounded
//! up to the next whole second, and are left for the store to expire.
//!
//! # Consistency
//!
//! The check is a read followed by a separate write. Two requests from the
//! same caller racing inside one window can both read the same count and
//! both be allowed, overshooting `max` by one per racer. This is accepted:
//! counters are best-effort. A strict limit needs an atomic conditional
//! increment in the store, not a read-then-write here.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::store::{Item, StorageBackend, Table, TableSpec};
use crate::telemetry;
use crate::{AstrofusionError, Result};

/// Default maximum requests per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Key attribute of the rate-limit table.
pub const KEY_ATTRIBUTE: &str = "ip_key";

/// Expiry attribute of the rate-limit table (epoch seconds).
pub const EXPIRY_ATTRIBUTE: &str = "ttl";

/// Rate limit settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per caller per window. Default: 5.
    pub max_requests: u32,
    /// Window length. Default: 60 seconds.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_requests(mut self, max: u32) -> Self {
        self.max_requests = max;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    fn window_millis(&self) -> i64 {
        // a zero window would divide by zero; treat it as one millisecond
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX).max(1)
    }

}

/// Result of [`RateLimiter::check_and_consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request counted; `count` is the caller's total in this window.
    Allowed { count: u32 },
    /// Caller already used its quota for this window; nothing was written.
    Limited,
}

impl RateDecision {
    pub fn is_limited(&self) -> bool {
        matches!(self, RateDecision::Limited)
    }
}

/// A stored window counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub ip_key: String,
    pub count: u32,
    /// Window expiry, Unix epoch seconds.
    pub ttl: i64,
}

/// Fixed-window limiter over a key-value table.
#[derive(Clone)]
pub struct RateLimiter {
    table: Arc<dyn Table>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(table: Arc<dyn Table>, config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            table,
            config,
            clock,
        }
    }

    /// Open the limiter's table on `backend`.
    ///
    /// A missing table name is a configuration error: an unconfigured
    /// limiter must not silently allow everything.
    pub fn open(
        backend: &dyn StorageBackend,
        table_name: Option<&str>,
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let name = table_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                AstrofusionError::Configuration("rate limit table is not configured".into())
            })?;
        let table = backend.open_table(table_spec(name))?;
        Ok(Self::new(table, config, clock))
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Storage key for `identity` in the window containing `now_millis`.
    pub fn window_key(&self, identity: &str, now_millis: i64) -> String {
        format!("{identity}#{}", self.bucket(now_millis))
    }

    /// Expiry (epoch seconds) for a record written at `now_millis`.
    ///
    /// Never earlier than the end of the window, so a counter outlives its
    /// bucket even when the window is not a whole number of seconds.
    pub fn window_expiry(&self, now_millis: i64) -> i64 {
        let window = self.config.window_millis();
        let end_millis = self.bucket(now_millis).saturating_add(1).saturating_mul(window);
        end_millis.div_euclid(1000) + i64::from(end_millis.rem_euclid(1000) != 0)
    }

    fn bucket(&self, now_millis: i64) -> i64 {
        now_millis.div_euclid(self.config.window_millis())
    }

    /// Count one request for `identity`, or report that it is over quota.
    pub async fn check_and_consume(&self, identity: &str) -> Result<RateDecision> {
        let now_millis = self.clock.now_millis();
        let key = self.window_key(identity, now_millis);

        let previous = match self.table.get(&key).await? {
            Some(item) => record_count(&key, &item)?,
            None => 0,
        };

        if previous >= self.config.max_requests {
            warn!(identity, key = %key, count = previous, "rate limit reached");
            metrics::counter!(telemetry::RATE_LIMITED_TOTAL).increment(1);
            return Ok(RateDecision::Limited);
        }

        let record = RateLimitRecord {
            ip_key: key,
            count: previous + 1,
            ttl: self.window_expiry(now_millis),
        };
        debug!(identity, key = %record.ip_key, count = record.count, "request counted");
        let count = record.count;
        self.table.put(to_item(&record)?).await?;

        Ok(RateDecision::Allowed { count })
    }
}

/// Table definition for rate-limit records.
pub fn table_spec(name: &str) -> TableSpec {
    TableSpec::new(name, KEY_ATTRIBUTE).expiry_attribute(EXPIRY_ATTRIBUTE)
}

fn record_count(key: &str, item: &Item) -> Result<u32> {
    match item.get("count") {
        None => Ok(0),
        Some(value) => value
            .as_u64()
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
            .ok_or_else(|| {
                AstrofusionError::Storage(format!("malformed rate limit count under '{key}'"))
            }),
    }
}

fn to_item(record: &RateLimitRecord) -> Result<Item> {
    match serde_json::to_value(record)? {
        Value::Object(item) => Ok(item),
        _ => Err(AstrofusionError::Storage(
            "rate limit record did not serialize to an object".into(),
        )),
    }
}
