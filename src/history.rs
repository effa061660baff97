//! Append-only log of successful fusions.
//!
//! Every fusion that reaches the caller as a success gets exactly one
//! [`HistoryRecord`], written before the response is built. Records are
//! never updated or deleted.
//!
//! Listing is a single scan page re-sorted newest first. Ordering is
//! therefore only guaranteed within a page; pagination follows the
//! table's key order, not `fecha`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::store::{Item, ScanRequest, StorageBackend, Table, TableSpec};
use crate::telemetry;
use crate::types::{FusionResult, HistoryRecord};
use crate::{AstrofusionError, Result};

/// Page size when the caller gives none.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Key attribute of the history table.
pub const KEY_ATTRIBUTE: &str = "id";

/// One page of history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub items: Vec<HistoryRecord>,
    /// URL-encoded JSON start key for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Writes and lists [`HistoryRecord`]s.
#[derive(Clone)]
pub struct HistoryRecorder {
    table: Arc<dyn Table>,
    clock: Arc<dyn Clock>,
}

impl HistoryRecorder {
    pub fn new(table: Arc<dyn Table>, clock: Arc<dyn Clock>) -> Self {
        Self { table, clock }
    }

    pub fn open(
        backend: &dyn StorageBackend,
        table_name: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let table = backend.open_table(TableSpec::new(table_name, KEY_ATTRIBUTE))?;
        Ok(Self::new(table, clock))
    }

    /// Append a record for `fusion` with a fresh id and the current time.
    pub async fn append(&self, fusion: &FusionResult) -> Result<HistoryRecord> {
        let record = HistoryRecord {
            id: Uuid::new_v4(),
            fecha: self.clock.now_utc(),
            planeta: fusion.planeta.clone(),
            fusion: fusion.clone(),
        };

        let item = match serde_json::to_value(&record)? {
            Value::Object(item) => item,
            _ => {
                return Err(AstrofusionError::Storage(
                    "history record did not serialize to an object".into(),
                ));
            }
        };
        self.table.put(item).await?;

        info!(id = %record.id, planeta = %record.planeta, "fusion recorded");
        metrics::counter!(telemetry::HISTORY_APPENDS_TOTAL).increment(1);
        Ok(record)
    }

    /// Read one page of at most `limit` records.
    ///
    /// `page_token` is the `next_page_token` of a previous page. A token
    /// that does not decode to a JSON object is an
    /// [`AstrofusionError::InvalidInput`].
    pub async fn list(&self, limit: usize, page_token: Option<&str>) -> Result<HistoryPage> {
        let exclusive_start_key = page_token.map(decode_page_token).transpose()?;
        let page = self
            .table
            .scan(ScanRequest {
                limit,
                exclusive_start_key,
            })
            .await?;

        let mut items = page
            .items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<HistoryRecord>(Value::Object(item)).map_err(|e| {
                    AstrofusionError::Storage(format!("malformed history record: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        items.sort_by(|a, b| b.fecha.cmp(&a.fecha));

        let next_page_token = page
            .last_evaluated_key
            .as_ref()
            .map(encode_page_token)
            .transpose()?;
        debug!(count = items.len(), more = next_page_token.is_some(), "history page read");

        Ok(HistoryPage {
            items,
            next_page_token,
        })
    }
}

/// `encodeURIComponent(JSON)` form of a scan position.
pub fn encode_page_token(key: &Item) -> Result<String> {
    let json = serde_json::to_string(key)?;
    Ok(urlencoding::encode(&json).into_owned())
}

/// Inverse of [`encode_page_token`]. Already-decoded JSON is accepted too.
pub fn decode_page_token(token: &str) -> Result<Item> {
    let decoded = urlencoding::decode(token)
        .map_err(|e| AstrofusionError::InvalidInput(format!("invalid page token: {e}")))?;
    match serde_json::from_str::<Value>(&decoded) {
        Ok(Value::Object(item)) => Ok(item),
        Ok(_) => Err(AstrofusionError::InvalidInput(
            "page token must be a JSON object".into(),
        )),
        Err(e) => Err(AstrofusionError::InvalidInput(format!("invalid page token: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryBackend;
    use crate::types::{Clima, Coordinates};
    use serde_json::json;

    fn fusion(planeta: &str) -> FusionResult {
        FusionResult {
            planeta: planeta.into(),
            poblacion: "200000".into(),
            terreno: "desert".into(),
            coordenadas: Coordinates::new(-12.05, -77.05),
            clima: Clima {
                temp_c: serde_json::Number::from(22),
                condition: "Sunny".into(),
                icon: "sun.png".into(),
            },
        }
    }

    fn recorder(clock: &ManualClock) -> HistoryRecorder {
        let backend = MemoryBackend::with_clock(Arc::new(clock.clone()));
        HistoryRecorder::open(&backend, "historial", Arc::new(clock.clone())).unwrap()
    }

    #[tokio::test]
    async fn append_stamps_id_and_time() {
        let clock = ManualClock::new(1_704_067_200_000);
        let history = recorder(&clock);

        let record = history.append(&fusion("Tatooine")).await.unwrap();
        assert_eq!(record.fecha.timestamp_millis(), 1_704_067_200_000);
        assert_eq!(record.planeta, "Tatooine");
        assert_eq!(record.id.get_version_num(), 4);
    }

    #[tokio::test]
    async fn list_sorts_newest_first_and_paginates() {
        let clock = ManualClock::new(1_000_000);
        let history = recorder(&clock);
        for name in ["A", "B", "C"] {
            history.append(&fusion(name)).await.unwrap();
            clock.advance_millis(1_000);
        }

        let first = history.list(2, None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.items[0].fecha >= first.items[1].fecha);
        let token = first.next_page_token.expect("more pages");

        let second = history.list(2, Some(&token)).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(second.next_page_token.is_none());
    }

    #[test]
    fn page_token_round_trips_and_rejects_garbage() {
        let key = json!({"id": "abc"}).as_object().cloned().unwrap();
        let token = encode_page_token(&key).unwrap();
        assert_eq!(token, "%7B%22id%22%3A%22abc%22%7D");
        assert_eq!(decode_page_token(&token).unwrap(), key);
        assert_eq!(decode_page_token(r#"{"id":"abc"}"#).unwrap(), key);

        for bad in ["not json", "[1,2]", "%7B"] {
            assert!(matches!(
                decode_page_token(bad).unwrap_err(),
                AstrofusionError::InvalidInput(_)
            ));
        }
    }
}
