//! Process-local table backend.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    Item, ScanPage, ScanRequest, StorageBackend, Table, TableSpec, item_key, key_item, start_key,
    visible,
};
use crate::clock::{Clock, SystemClock};
use crate::{AstrofusionError, Result};

/// In-memory backend. Tables opened under the same name share their data.
pub struct MemoryBackend {
    clock: Arc<dyn Clock>,
    tables: Mutex<HashMap<String, Arc<MemoryTable>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Backend whose expiry checks read `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Open (or reuse) a table and return the concrete handle.
    pub fn memory_table(&self, spec: TableSpec) -> Result<Arc<MemoryTable>> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| AstrofusionError::Storage("memory backend lock poisoned".into()))?;

        if let Some(existing) = tables.get(&spec.name) {
            if existing.spec != spec {
                return Err(AstrofusionError::Configuration(format!(
                    "table '{}' already opened with a different definition",
                    spec.name
                )));
            }
            return Ok(existing.clone());
        }

        let table = Arc::new(MemoryTable {
            spec: spec.clone(),
            clock: self.clock.clone(),
            rows: RwLock::new(BTreeMap::new()),
        });
        tables.insert(spec.name, table.clone());
        Ok(table)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn open_table(&self, spec: TableSpec) -> Result<Arc<dyn Table>> {
        Ok(self.memory_table(spec)?)
    }
}

/// Ordered in-memory table.
pub struct MemoryTable {
    spec: TableSpec,
    clock: Arc<dyn Clock>,
    rows: RwLock<BTreeMap<String, Item>>,
}

impl MemoryTable {
    /// Number of stored items, expired ones included.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every stored item in key order, expired ones included.
    pub async fn items(&self) -> Vec<Item> {
        self.rows.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl Table for MemoryTable {
    fn spec(&self) -> &TableSpec {
        &self.spec
    }

    async fn get(&self, key: &str) -> Result<Option<Item>> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(key)
            .cloned()
            .and_then(|item| visible(&self.spec, &self.clock, item)))
    }

    async fn put(&self, item: Item) -> Result<()> {
        let key = item_key(&self.spec, &item)?.to_string();
        self.rows.write().await.insert(key, item);
        Ok(())
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanPage> {
        let lower = match start_key(&self.spec, &request)? {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };

        let rows = self.rows.read().await;
        let mut remaining = rows
            .range::<String, _>((lower, Bound::Unbounded))
            .filter_map(|(key, item)| {
                visible(&self.spec, &self.clock, item.clone()).map(|item| (key, item))
            });

        let mut page = ScanPage::default();
        let mut last_key = None;
        for (key, item) in remaining.by_ref().take(request.limit) {
            last_key = Some(key.clone());
            page.items.push(item);
        }

        if remaining.next().is_some() {
            page.last_evaluated_key = last_key.map(|key| key_item(&self.spec, &key));
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::{Value, json};

    fn obj(value: Value) -> Item {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn put_then_get_replaces_whole_item() {
        let backend = MemoryBackend::new();
        let table = backend.open_table(TableSpec::new("t", "id")).unwrap();

        table.put(obj(json!({"id": "a", "v": 1, "old": true}))).await.unwrap();
        table.put(obj(json!({"id": "a", "v": 2}))).await.unwrap();

        let got = table.get("a").await.unwrap().unwrap();
        assert_eq!(got["v"], 2);
        assert!(!got.contains_key("old"));
        assert!(table.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn same_name_shares_rows() {
        let backend = MemoryBackend::new();
        let a = backend.open_table(TableSpec::new("shared", "id")).unwrap();
        let b = backend.open_table(TableSpec::new("shared", "id")).unwrap();

        a.put(obj(json!({"id": "x"}))).await.unwrap();
        assert!(b.get("x").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn conflicting_definition_is_rejected() {
        let backend = MemoryBackend::new();
        backend.open_table(TableSpec::new("t", "id")).unwrap();
        let err = backend.open_table(TableSpec::new("t", "pk")).err().unwrap();
        assert!(matches!(err, AstrofusionError::Configuration(_)));
    }

    #[tokio::test]
    async fn expired_items_read_as_absent() {
        let clock = ManualClock::new(100_000);
        let backend = MemoryBackend::with_clock(Arc::new(clock.clone()));
        let table = backend
            .memory_table(TableSpec::new("t", "id").expiry_attribute("ttl"))
            .unwrap();

        table.put(obj(json!({"id": "a", "ttl": 160}))).await.unwrap();
        assert!(table.get("a").await.unwrap().is_some());

        clock.set(160_000);
        assert!(table.get("a").await.unwrap().is_none());
        // still physically present
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn scan_pages_in_key_order() {
        let backend = MemoryBackend::new();
        let table = backend.open_table(TableSpec::new("t", "id")).unwrap();
        for id in ["c", "a", "b"] {
            table.put(obj(json!({"id": id}))).await.unwrap();
        }

        let first = table
            .scan(ScanRequest {
                limit: 2,
                exclusive_start_key: None,
            })
            .await
            .unwrap();
        let ids: Vec<_> = first.items.iter().map(|i| i["id"].clone()).collect();
        assert_eq!(ids, vec![json!("a"), json!("b")]);
        assert_eq!(first.last_evaluated_key, Some(obj(json!({"id": "b"}))));

        let second = table
            .scan(ScanRequest {
                limit: 2,
                exclusive_start_key: first.last_evaluated_key,
            })
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0]["id"], "c");
        assert!(second.last_evaluated_key.is_none());
    }
}
