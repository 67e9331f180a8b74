//! On-disk representation of a database.
//!
//! The file is a JSON array with one record per collection:
//! `[{"name": "users", "index": 0, "keys": {"alice": {...}}}, ...]`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{JseError, Result};

/// One collection as stored in the database file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub name: String,
    /// Position at creation time. Informational only.
    pub index: u64,
    #[serde(default)]
    pub keys: Map<String, Value>,
}

/// Full content of a database file.
pub type DatabaseFile = Vec<CollectionRecord>;

impl CollectionRecord {
    pub fn new(name: impl Into<String>, index: u64) -> Self {
        CollectionRecord {
            name: name.into(),
            index,
            keys: Map::new(),
        }
    }
}

/// Parse the raw bytes of a database file.
///
/// Empty content decodes as an empty database.
pub fn decode(path: &Path, bytes: &[u8]) -> Result<DatabaseFile> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| JseError::corruption(path, format!("invalid JSON: {}", e)))?;

    if !value.is_array() {
        return Err(JseError::corruption(path, "top-level value is not an array"));
    }

    serde_json::from_value(value)
        .map_err(|e| JseError::corruption(path, format!("malformed collection record: {}", e)))
}

/// Serialize a database for writing.
pub fn encode(path: &Path, records: &[CollectionRecord]) -> Result<Vec<u8>> {
    serde_json::to_vec(records).map_err(|e| JseError::corruption(path, e.to_string()))
}

/// Position of the record named `name`.
pub fn position(records: &[CollectionRecord], name: &str) -> Option<usize> {
    records.iter().position(|r| r.name == name)
}
