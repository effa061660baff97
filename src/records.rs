//! Free-form record store behind `POST /almacenar`.
//!
//! A record is an attribute bag with two required fields, `nombre` and
//! `descripcion`. Each must be present and truthy: `null`, `false`, `0` and
//! `""` are rejected, anything else (numbers, objects, `"  "`) is accepted. Any other attributes the caller sends are stored and
//! returned as-is. `id` and `creadoEn` are always assigned here and
//! overwrite caller values of the same name.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::store::{Item, StorageBackend, Table, TableSpec};
use crate::{AstrofusionError, Result};

pub const EMPTY_BODY_MESSAGE: &str = "Cuerpo vacío";
pub const INVALID_BODY_MESSAGE: &str = "Cuerpo inválido";
pub const MISSING_FIELDS_MESSAGE: &str = "Faltan campos obligatorios: nombre y descripción";

/// Key attribute of the records table.
pub const KEY_ATTRIBUTE: &str = "id";

/// Stores caller-defined records.
#[derive(Clone)]
pub struct RecordStore {
    table: Arc<dyn Table>,
    clock: Arc<dyn Clock>,
}

impl RecordStore {
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

    /// Validate a raw request body and store it.
    ///
    /// Validation failures are [`AstrofusionError::InvalidInput`] carrying the
    /// caller-facing message.
    pub async fn store_body(&self, body: &[u8]) -> Result<Item> {
        let attributes = parse_body(body)?;
        self.store(attributes).await
    }

    /// Store an already-parsed attribute bag.
    pub async fn store(&self, mut attributes: Map<String, Value>) -> Result<Item> {
        if !is_truthy(&attributes, "nombre") || !is_truthy(&attributes, "descripcion") {
            return Err(AstrofusionError::InvalidInput(MISSING_FIELDS_MESSAGE.into()));
        }

        let id = Uuid::new_v4().to_string();
        attributes.insert(KEY_ATTRIBUTE.into(), Value::String(id.clone()));
        attributes.insert(
            "creadoEn".into(),
            Value::String(self.clock.now_utc().to_rfc3339()),
        );

        self.table.put(attributes.clone()).await?;
        info!(id = %id, "record stored");
        Ok(attributes)
    }
}

fn parse_body(body: &[u8]) -> Result<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AstrofusionError::InvalidInput(EMPTY_BODY_MESSAGE.into()));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(attributes)) => Ok(attributes),
        _ => Err(AstrofusionError::InvalidInput(INVALID_BODY_MESSAGE.into())),
    }
}

fn is_truthy(attributes: &Map<String, Value>, field: &str) -> bool {
    match attributes.get(field) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(_) => true,
    }
}
