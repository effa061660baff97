//! Key-value table storage.
//!
//! Every piece of durable state (cache entries, rate-limit counters, history
//! records, stored records) lives in a named [`Table`] of JSON items. A
//! [`StorageBackend`] is constructed once per process and hands out table
//! handles; components receive the handle they need at construction time.
//!
//! Tables guarantee that a single `get` and a single `put` are each atomic.
//! Nothing wraps a read followed by a write, so read-modify-write sequences
//! built on top (the rate limiter, cache refresh) are last-writer-wins.
//!
//! # Expiry
//!
//! A table may name an *expiry attribute* holding Unix epoch seconds. Items
//! whose expiry is in the past read as absent from `get` and are skipped by
//! `scan`; they are not removed eagerly.

mod memory;

#[cfg(feature = "lmdb")]
mod lmdb;

pub use memory::{MemoryBackend, MemoryTable};

#[cfg(feature = "lmdb")]
pub use lmdb::{LmdbBackend, LmdbTable};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::clock::Clock;
use crate::{AstrofusionError, Result};

/// A stored item: a JSON object.
pub type Item = Map<String, Value>;

/// Table definition: name, key attribute and optional expiry attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub key_attribute: String,
    pub expiry_attribute: Option<String>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, key_attribute: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_attribute: key_attribute.into(),
            expiry_attribute: None,
        }
    }

    /// Treat items as absent once `attribute` (epoch seconds) has passed.
    pub fn expiry_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.expiry_attribute = Some(attribute.into());
        self
    }
}

/// A single page request for [`Table::scan`].
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    /// Maximum number of items to return.
    pub limit: usize,
    /// Resume strictly after this key (the previous page's `last_evaluated_key`).
    pub exclusive_start_key: Option<Item>,
}

/// One page of a scan, in key order.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// Key of the last returned item when more items remain.
    pub last_evaluated_key: Option<Item>,
}

/// A named table of JSON items keyed by a string attribute.
#[async_trait]
pub trait Table: Send + Sync {
    fn spec(&self) -> &TableSpec;

    /// Fetch the item stored under `key`, if any (and not expired).
    async fn get(&self, key: &str) -> Result<Option<Item>>;

    /// Insert or fully replace the item under its key attribute.
    async fn put(&self, item: Item) -> Result<()>;

    /// Read one page of items in ascending key order.
    async fn scan(&self, request: ScanRequest) -> Result<ScanPage>;
}

/// Opens tables. One backend per process, shared by every component.
pub trait StorageBackend: Send + Sync {
    fn open_table(&self, spec: TableSpec) -> Result<Arc<dyn Table>>;
}

/// Extract the string key of `item` according to `spec`.
pub(crate) fn item_key<'a>(spec: &TableSpec, item: &'a Item) -> Result<&'a str> {
    match item.get(&spec.key_attribute) {
        Some(Value::String(key)) => Ok(key),
        Some(_) => Err(AstrofusionError::Storage(format!(
            "key attribute '{}' in table '{}' must be a string",
            spec.key_attribute, spec.name
        ))),
        None => Err(AstrofusionError::Storage(format!(
            "item for table '{}' is missing key attribute '{}'",
            spec.name, spec.key_attribute
        ))),
    }
}

/// Build the key-only item that marks a scan position.
pub(crate) fn key_item(spec: &TableSpec, key: &str) -> Item {
    let mut item = Item::new();
    item.insert(spec.key_attribute.clone(), Value::String(key.to_string()));
    item
}

/// Whether `item` is past its expiry attribute at `now_secs`.
pub(crate) fn is_expired(spec: &TableSpec, item: &Item, now_secs: i64) -> bool {
    spec.expiry_attribute
        .as_ref()
        .and_then(|attr| item.get(attr))
        .and_then(Value::as_i64)
        .is_some_and(|expiry| expiry <= now_secs)
}

/// Resolve a scan's start key to its string form.
pub(crate) fn start_key(spec: &TableSpec, request: &ScanRequest) -> Result<Option<String>> {
    request
        .exclusive_start_key
        .as_ref()
        .map(|item| item_key(spec, item).map(str::to_string))
        .transpose()
        .map_err(|_| {
            AstrofusionError::InvalidInput(format!(
                "start key for table '{}' must contain string attribute '{}'",
                spec.name, spec.key_attribute
            ))
        })
}

/// Shared expiry check used by both backends.
pub(crate) fn visible(spec: &TableSpec, clock: &Arc<dyn Clock>, item: Item) -> Option<Item> {
    if is_expired(spec, &item, clock.now_secs()) {
        None
    } else {
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Item {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn item_key_requires_string_attribute() {
        let spec = TableSpec::new("t", "id");
        assert_eq!(item_key(&spec, &obj(json!({"id": "a"}))).unwrap(), "a");
        assert!(item_key(&spec, &obj(json!({"id": 1}))).is_err());
        assert!(item_key(&spec, &obj(json!({"other": "a"}))).is_err());
    }

    #[test]
    fn expiry_only_applies_when_configured() {
        let item = obj(json!({"id": "a", "ttl": 100}));
        let plain = TableSpec::new("t", "id");
        let expiring = TableSpec::new("t", "id").expiry_attribute("ttl");
        assert!(!is_expired(&plain, &item, 500));
        assert!(is_expired(&expiring, &item, 100));
        assert!(!is_expired(&expiring, &item, 99));
    }

    #[test]
    fn start_key_rejects_foreign_shape() {
        let spec = TableSpec::new("t", "id");
        let request = ScanRequest {
            limit: 1,
            exclusive_start_key: Some(obj(json!({"pk": "x"}))),
        };
        assert!(matches!(
            start_key(&spec, &request),
            Err(AstrofusionError::InvalidInput(_))
        ));
    }
}
