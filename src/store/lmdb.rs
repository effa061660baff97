//! Durable table backend on LMDB.
//!
//! Uses the heed crate. One LMDB environment per process; each table is a
//! named database inside it, keyed by the item's key attribute with the
//! item serialized as JSON. Keys sort bytewise, which gives `scan` the same
//! ascending order as the in-memory backend.

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};

use super::{
    Item, ScanPage, ScanRequest, StorageBackend, Table, TableSpec, item_key, key_item, start_key,
    visible,
};
use crate::clock::{Clock, SystemClock};
use crate::{AstrofusionError, Result};

/// Default maximum number of named tables in one environment.
const DEFAULT_MAX_TABLES: u32 = 16;

/// LMDB-backed storage.
pub struct LmdbBackend {
    env: Env,
    clock: Arc<dyn Clock>,
}

impl LmdbBackend {
    /// Open (creating if needed) an environment under `path`.
    ///
    /// `max_size_mb` bounds the memory map and therefore the total data size.
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self> {
        Self::open_with_clock(path, max_size_mb, Arc::new(SystemClock))
    }

    pub fn open_with_clock<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&path).map_err(|e| {
            AstrofusionError::Storage(format!(
                "failed to create LMDB directory {:?}: {e}",
                path.as_ref()
            ))
        })?;

        // SAFETY: the environment directory is owned by this process; LMDB
        // requires that no other process maps it with incompatible options.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(DEFAULT_MAX_TABLES)
                .open(path.as_ref())
        }?;

        Ok(Self { env, clock })
    }
}

impl StorageBackend for LmdbBackend {
    fn open_table(&self, spec: TableSpec) -> Result<Arc<dyn Table>> {
        let mut wtxn = self.env.write_txn()?;
        let db: Database<Str, Bytes> = self.env.create_database(&mut wtxn, Some(&spec.name))?;
        wtxn.commit()?;

        Ok(Arc::new(LmdbTable {
            spec,
            env: self.env.clone(),
            db,
            clock: self.clock.clone(),
        }))
    }
}

/// One named LMDB database.
pub struct LmdbTable {
    spec: TableSpec,
    env: Env,
    db: Database<Str, Bytes>,
    clock: Arc<dyn Clock>,
}

impl LmdbTable {
    fn decode(&self, bytes: &[u8]) -> Result<Item> {
        serde_json::from_slice(bytes).map_err(|e| {
            AstrofusionError::Storage(format!("corrupt item in table '{}': {e}", self.spec.name))
        })
    }
}

#[async_trait]
impl Table for LmdbTable {
    fn spec(&self) -> &TableSpec {
        &self.spec
    }

    async fn get(&self, key: &str) -> Result<Option<Item>> {
        let rtxn = self.env.read_txn()?;
        let Some(bytes) = self.db.get(&rtxn, key)? else {
            return Ok(None);
        };
        let item = self.decode(bytes)?;
        Ok(visible(&self.spec, &self.clock, item))
    }

    async fn put(&self, item: Item) -> Result<()> {
        let key = item_key(&self.spec, &item)?;
        let bytes = serde_json::to_vec(&item)?;

        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, key, &bytes)?;
        wtxn.commit()?;
        Ok(())
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanPage> {
        let start = start_key(&self.spec, &request)?;
        let lower = match start.as_deref() {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let range: (Bound<&str>, Bound<&str>) = (lower, Bound::Unbounded);

        let rtxn = self.env.read_txn()?;
        let mut page = ScanPage::default();
        let mut last_key: Option<String> = None;

        for entry in self.db.range(&rtxn, &range)? {
            let (key, bytes) = entry?;
            let Some(item) = visible(&self.spec, &self.clock, self.decode(bytes)?) else {
                continue;
            };
            if page.items.len() == request.limit {
                page.last_evaluated_key = last_key.as_deref().map(|k| key_item(&self.spec, k));
                break;
            }
            last_key = Some(key.to_string());
            page.items.push(item);
        }

        Ok(page)
    }
}
