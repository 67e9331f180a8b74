//! JSEDB - a tiny embedded JSON document store.
//!
//! A database is a single JSON file holding named collections, each a flat
//! map of string keys to JSON values. Every operation reads or rewrites the
//! whole file.
//!
//! ```no_run
//! use jsedb::{Database, DatabaseConfig};
//! use serde_json::json;
//!
//! # async fn run() -> jsedb::Result<()> {
//! let db = Database::open(DatabaseConfig::new("app", "/tmp").polite(true));
//! let users = db.create_collection("Users").await?;
//! users.set("alice", json!({"age": 30})).await?;
//! assert!(users.has("alice").await?);
//! db.close().await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod collection;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod record;
pub mod storage;

pub use collection::Collection;
pub use config::{Config, ConfigError, DatabaseConfig, LoggingConfig};
pub use database::Database;
pub use error::{JseError, Result};
pub use record::{CollectionRecord, DatabaseFile};
pub use storage::{FileStore, FsStore, MemoryStore};
