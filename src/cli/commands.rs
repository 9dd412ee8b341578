//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tenantsync - declarative tenant configuration synchronization.
#[derive(Parser, Debug)]
#[command(name = "tenantsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Management API base URL (overrides the environment).
    #[arg(long, global = true, env = "TENANTSYNC_DOMAIN")]
    pub domain: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a desired-state document to the remote tenant.
    Deploy {
        /// Path to the desired-state document.
        #[arg(default_value = "tenant.yaml")]
        input: PathBuf,
    },

    /// Export the remote tenant's state to a desired-state document.
    Dump {
        /// Path to write the document to.
        #[arg(default_value = "tenant.yaml")]
        output: PathBuf,

        /// Force overwrite of an existing file.
        #[arg(short, long)]
        force: bool,
    },

    /// Compute and display the plan without applying it.
    Plan {
        /// Path to the desired-state document.
        #[arg(default_value = "tenant.yaml")]
        input: PathBuf,

        /// Show per-operation dependency information.
        #[arg(short, long)]
        detailed: bool,
    },

    /// Validate a desired-state document without touching the remote.
    Validate {
        /// Path to the desired-state document.
        #[arg(default_value = "tenant.yaml")]
        input: PathBuf,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
