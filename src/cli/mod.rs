//! CLI module for the tenantsync tool.
//!
//! This module provides the command-line interface for synchronizing
//! tenant configuration.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
