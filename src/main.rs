//! Tenantsync CLI entrypoint.
//!
//! This is the main entrypoint for the tenantsync command-line tool.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tenantsync::cli::{Cli, Commands, OutputFormatter};
use tenantsync::config::SyncConfig;
use tenantsync::error::{Result, SyncError};
use tenantsync::loader;
use tenantsync::registry::Registry;
use tenantsync::remote::HttpManagementClient;
use tenantsync::sync::{SyncEngine, validate_document};
use tenantsync::Context;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Deploy { input } => cmd_deploy(&input, cli.domain, &formatter).await,
        Commands::Dump { output, force } => {
            cmd_dump(&output, force, cli.domain, &formatter).await
        }
        Commands::Plan { input, detailed } => {
            cmd_plan(&input, detailed, cli.domain, &formatter).await
        }
        Commands::Validate { input } => cmd_validate(&input, &formatter),
    }
}

/// Apply a desired-state document.
async fn cmd_deploy(
    input: &Path,
    domain: Option<String>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(domain)?;
    let document = loader::load(input)?;
    info!("Deploying {} to {}", input.display(), config.domain);

    let engine = SyncEngine::new(create_client(&config)?);
    let mut ctx = Context::new(config, document);

    // Ctrl-C requests cooperative cancellation; in-flight operations finish.
    let cancel = ctx.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let result = engine.deploy(&mut ctx).await?;
    eprintln!("{}", formatter.format_result(&result));

    if result.success() {
        Ok(())
    } else {
        Err(SyncError::internal(format!(
            "{} operation(s) failed, {} skipped",
            result.failed(),
            result.skipped()
        )))
    }
}

/// Export the remote tenant to a document.
async fn cmd_dump(
    output: &Path,
    force: bool,
    domain: Option<String>,
    formatter: &OutputFormatter,
) -> Result<()> {
    loader::ensure_writable(output, force)?;

    let config = load_config(domain)?;
    info!("Dumping {} to {}", config.domain, output.display());

    let engine = SyncEngine::new(create_client(&config)?);
    let mut ctx = Context::new(config, tenantsync::DesiredDocument::new());

    let document = engine.dump(&mut ctx).await?;
    loader::save(&document, output)?;

    eprintln!("{}", formatter.format_document(&document));
    eprintln!("Written to {}", output.display());
    Ok(())
}

/// Show the plan without applying it.
async fn cmd_plan(
    input: &Path,
    detailed: bool,
    domain: Option<String>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(domain)?;
    let document = loader::load(input)?;

    let engine = SyncEngine::new(create_client(&config)?);
    let mut ctx = Context::new(config, document);

    let plan = engine.plan(&mut ctx).await?;
    eprintln!("{}", formatter.format_plan(&plan, detailed));
    Ok(())
}

/// Validate a document without touching the remote.
fn cmd_validate(input: &Path, formatter: &OutputFormatter) -> Result<()> {
    let document = loader::load(input)?;
    let registry = Registry::builtin();
    validate_document(&registry, &document)?;

    eprintln!("{}", formatter.format_document(&document));
    Ok(())
}

/// Loads configuration, applying the CLI domain override.
fn load_config(domain: Option<String>) -> Result<SyncConfig> {
    SyncConfig::from_env_with_domain(domain)
}

/// Creates the management API client.
fn create_client(config: &SyncConfig) -> Result<Arc<HttpManagementClient>> {
    Ok(Arc::new(HttpManagementClient::new(
        &config.domain,
        &config.token,
        config.timeout_secs,
    )?))
}
