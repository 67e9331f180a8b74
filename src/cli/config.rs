//! CLI Configuration and Arguments
//!
//! Command-line argument parsing and configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;

/// JSEDB CLI - inspect and edit a JSEDB database file
#[derive(Parser, Debug, Clone)]
#[command(name = "jsedb")]
#[command(author = "JSEDB Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Command line interface for JSEDB databases", long_about = None)]
pub struct CliArgs {
    /// Directory holding the database file
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// Database name
    #[arg(short, long)]
    pub name: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Refuse to overwrite existing keys
    #[arg(long)]
    pub polite: bool,

    /// Delete the database file when the command finishes
    #[arg(long)]
    pub ephemeral: bool,

    /// Print the database file before deleting it (with --ephemeral)
    #[arg(long)]
    pub print_on_exit: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print compact JSON instead of pretty JSON
    #[arg(long)]
    pub raw: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Database commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List tracked collections
    Collections,
    /// Create a collection
    Create { collection: String },
    /// Drop a collection
    Drop { collection: String },
    /// Get the value of a key
    Get { collection: String, key: String },
    /// Check whether a key exists
    Has { collection: String, key: String },
    /// Set a key; the value is parsed as JSON, or stored as a string
    Set {
        collection: String,
        key: String,
        value: String,
    },
    /// Delete one or more keys
    Delete {
        collection: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Dump the whole database file
    Export,
}

/// Default directory for database files
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("jsedb"))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl CliArgs {
    /// Merge the optional config file with command-line flags.
    ///
    /// Flags win over the file; the data directory is only defaulted when
    /// neither names one.
    pub fn resolve(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => {
                let mut config = Config::default();
                config.database.path = default_data_dir();
                config
            }
        };

        if let Some(path) = &self.path {
            config.database.path = path.clone();
        }
        if let Some(name) = &self.name {
            config.database.name = name.to_lowercase();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        config.database.polite |= self.polite;
        config.database.persistent &= !self.ephemeral;
        config.database.print_on_exit |= self.print_on_exit;

        Ok(config)
    }
}
