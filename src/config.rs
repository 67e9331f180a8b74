//! Configuration management for JSEDB.
//!
//! A database is configured either in code through [`DatabaseConfig`]'s
//! setters or from a TOML file with `[database]` and `[logging]` tables.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database name, folded to lowercase
    #[serde(default = "default_name")]
    pub name: String,
    /// Directory holding the database file
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Keep the file after shutdown
    #[serde(default = "default_persistent")]
    pub persistent: bool,
    /// Refuse to overwrite existing keys
    #[serde(default)]
    pub polite: bool,
    /// Print the file before deleting it (non-persistent only)
    #[serde(default)]
    pub print_on_exit: bool,
    /// Run every read-modify-write under one shared writer lock
    #[serde(default)]
    pub serialize_writes: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_name() -> String {
    "default".to_string()
}

fn default_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_persistent() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            name: default_name(),
            path: default_path(),
            persistent: default_persistent(),
            polite: false,
            print_on_exit: false,
            serialize_writes: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

impl DatabaseConfig {
    /// Create a configuration with the default policies
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        DatabaseConfig {
            name: name.into().to_lowercase(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn polite(mut self, polite: bool) -> Self {
        self.polite = polite;
        self
    }

    pub fn print_on_exit(mut self, print_on_exit: bool) -> Self {
        self.print_on_exit = print_on_exit;
        self
    }

    pub fn serialize_writes(mut self, serialize_writes: bool) -> Self {
        self.serialize_writes = serialize_writes;
        self
    }

    /// Lowercased database name
    pub fn normalized_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Path of the backing file: `{path}/jse-{name}.json`
    pub fn file_path(&self) -> PathBuf {
        self.path.join(format!("jse-{}.json", self.normalized_name()))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Configuration error types
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}
