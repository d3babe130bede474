//! CLI command implementations for bookmarks-alive-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Bookmarks store validation
//! - `config`: Configuration file generation
//! - `test`: One-off collection runs without the HTTP server

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use test::command_test;
