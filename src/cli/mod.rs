//! JSEDB CLI Library
//!
//! Argument parsing, command execution and output for the `jsedb` binary.

pub mod commands;
pub mod config;
pub mod output;
