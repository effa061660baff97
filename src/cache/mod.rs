//! Time-bounded cache for upstream responses.
//!
//! [`CacheStore`] is a thin get/put layer over a [`Table`]. Each entry
//! carries the millisecond timestamp of its write; the store never evicts
//! and never judges freshness itself. Callers decide with
//! [`CacheEntry::is_fresh`] against their TTL, so a stale entry is simply
//! ignored and later overwritten by the next successful fetch.
//!
//! # Keys
//!
//! Keys are composite strings chosen by the caller, e.g. `weather#3` or
//! `swapi#Tatooine`. Entries are whole-item replaced on write
//! (last-writer-wins, no versioning).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::clock::Clock;
use crate::store::{Item, Table};
use crate::{AstrofusionError, Result};

/// Default time-to-live for upstream responses (30 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Configuration for the upstream response cache.
///
/// ```rust
/// # use astrofusion::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new().ttl(Duration::from_secs(600));
/// assert_eq!(config.ttl_millis(), 600_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an entry counts as fresh. Default: 30 minutes.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

/// A cached upstream payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: String,
    /// Write time, Unix epoch milliseconds.
    pub timestamp: i64,
    /// The upstream payload, stored opaquely.
    pub data: Value,
}

impl CacheEntry {
    /// Fresh iff `now - timestamp < ttl`.
    pub fn is_fresh(&self, now_millis: i64, ttl_millis: i64) -> bool {
        now_millis.saturating_sub(self.timestamp) < ttl_millis
    }
}

/// Get/put access to the cache table.
#[derive(Clone)]
pub struct CacheStore {
    table: Arc<dyn Table>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(table: Arc<dyn Table>, clock: Arc<dyn Clock>) -> Self {
        Self { table, clock }
    }

    /// Read the entry under `key`, fresh or not.
    ///
    /// An item that does not decode as a [`CacheEntry`] reads as absent, so
    /// the next successful fetch replaces it.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let Some(item) = self.table.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_value(Value::Object(item)) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(key, error = %e, "ignoring malformed cache entry");
                Ok(None)
            }
        }
    }

    /// Write `data` under `key`, stamped with the current time.
    pub async fn put(&self, key: &str, data: Value) -> Result<CacheEntry> {
        let entry = CacheEntry {
            id: key.to_string(),
            timestamp: self.clock.now_millis(),
            data,
        };
        self.table.put(to_item(&entry)?).await?;
        Ok(entry)
    }
}

fn to_item(entry: &CacheEntry) -> Result<Item> {
    match serde_json::to_value(entry)? {
        Value::Object(item) => Ok(item),
        _ => Err(AstrofusionError::Storage(
            "cache entry did not serialize to an object".into(),
        )),
    }
}
