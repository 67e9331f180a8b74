//! CLI Commands
//!
//! Runs one parsed command against an open database.

use serde_json::{json, Value};
use std::sync::Arc;

use super::config::Command;
use crate::collection::Collection;
use crate::database::Database;
use crate::error::{JseError, Result};

/// Parse a command-line value as JSON, falling back to a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

async fn existing(db: &Database, name: &str) -> Result<Arc<Collection>> {
    db.get_collection(name)
        .await?
        .ok_or_else(|| JseError::CollectionNotFound {
            database: db.name().to_string(),
            collection: name.to_lowercase(),
        })
}

/// Execute `command` and return what should be printed.
pub async fn run(db: &Database, command: &Command) -> Result<Value> {
    match command {
        Command::Collections => {
            db.ready().await?;
            Ok(json!(db.collection_names()))
        }
        Command::Create { collection } => {
            let collection = db.create_collection(collection).await?;
            Ok(json!(collection.name()))
        }
        Command::Drop { collection } => Ok(json!(db.drop_collection(collection).await?)),
        Command::Get { collection, key } => {
            let collection = existing(db, collection).await?;
            Ok(collection.get(key).await?.unwrap_or(Value::Null))
        }
        Command::Has { collection, key } => {
            let collection = existing(db, collection).await?;
            Ok(json!(collection.has(key).await?))
        }
        Command::Set {
            collection,
            key,
            value,
        } => {
            let collection = db.create_collection(collection).await?;
            collection.set(key, parse_value(value)).await
        }
        Command::Delete { collection, keys } => {
            let collection = existing(db, collection).await?;
            let removed = match keys.as_slice() {
                [key] => collection.delete_one(key).await?,
                keys => collection.delete_many(keys).await?,
            };
            Ok(Value::Array(removed))
        }
        Command::Export => {
            let records = db.export().await?;
            serde_json::to_value(records)
                .map_err(|e| JseError::corruption(db.file_path(), e.to_string()))
        }
    }
}
