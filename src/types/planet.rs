//! Planet catalog entries

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A planet as returned by the catalog.
///
/// Catalog fields are strings even when numeric ("200000", "unknown").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planet {
    pub name: String,
    pub population: String,
    pub terrain: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
