//! Error types for JSEDB.
//!
//! Every database and collection operation is fallible and reports one of
//! these kinds. Exit-time cleanup is the only place errors are swallowed.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for JSEDB operations.
pub type Result<T> = std::result::Result<T, JseError>;

/// JSEDB error type
#[derive(Debug, Error)]
pub enum JseError {
    /// A required argument was missing or invalid.
    #[error("[JSE] Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing file could not be created, read, written or deleted.
    #[error("[JSE] Storage error on {}: {source}", .path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing file is not a JSON array of collection records.
    #[error("[JSE] Corrupted database file {}: {reason}", .path.display())]
    Corruption { path: PathBuf, reason: String },

    /// Polite mode refused to overwrite an existing key.
    #[error("[JSE] Cannot overwrite key '{key}' in {database}.{collection}. This key/value combination already exists")]
    PoliteMode {
        database: String,
        collection: String,
        key: String,
    },

    /// The collection's record is no longer present in the backing file.
    #[error("[JSE] Collection '{collection}' does not exist in database '{database}'")]
    CollectionNotFound { database: String, collection: String },

    /// Configuration could not be loaded.
    #[error("[JSE] {0}")]
    Config(#[from] ConfigError),
}

impl JseError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        JseError::StorageIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corruption(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        JseError::Corruption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is the expected outcome of a polite-mode overwrite attempt.
    pub fn is_polite_mode(&self) -> bool {
        matches!(self, JseError::PoliteMode { .. })
    }
}
