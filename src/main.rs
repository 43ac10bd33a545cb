//! Quaymaster CLI entrypoint.
//!
//! This is the main entrypoint for the quaymaster agent binary.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use quaymaster::agent::{
    AgentWorker, DeltaFeed, DeltaFilePoller, DeltaHandler, FileReportSink, LogReportSink,
    ReportSink, StateReporter,
};
use quaymaster::cli::{Cli, Commands, OutputFormatter};
use quaymaster::config::{
    AgentConfig, ConfigParser, ConfigValidator, DesiredSet, find_config_file, load_delta_file,
};
use quaymaster::error::{QuaymasterError, Result};
use quaymaster::planner::Planner;
use quaymaster::runtime::{ContainerRuntime, DockerRuntime};

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
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings),
        Commands::Plan { delta } => cmd_plan(cli.config.as_ref(), &delta, &formatter).await,
        Commands::Apply { delta } => cmd_apply(cli.config.as_ref(), &delta, &formatter).await,
        Commands::Status => cmd_status(cli.config.as_ref(), &formatter).await,
        Commands::Run { delta, interval } => cmd_run(cli.config.as_ref(), delta, interval).await,
    }
}

/// Loads the agent configuration, discovering the file if none was given.
fn load_config(explicit: Option<&PathBuf>) -> Result<AgentConfig> {
    let parser = ConfigParser::new();
    parser.load_dotenv()?;

    let path = match explicit {
        Some(path) => path.clone(),
        None => find_config_file(std::env::current_dir()?)?,
    };

    parser.load_file(path)
}

/// Builds the report sink from configuration.
fn build_sink(config: &AgentConfig) -> Box<dyn ReportSink> {
    match &config.report.path {
        Some(path) => Box::new(FileReportSink::new(path.clone())),
        None => Box::new(LogReportSink::new()),
    }
}

/// Builds the delta handler wired to the configured runtime and sink.
fn build_handler(
    config: &AgentConfig,
) -> Result<DeltaHandler<DockerRuntime, Box<dyn ReportSink>>> {
    let runtime = DockerRuntime::connect(&config.runtime)?;
    let reporter = StateReporter::new(build_sink(config), config.agent.name.clone());

    Ok(DeltaHandler::new(
        runtime,
        reporter,
        config.registries.clone(),
        Duration::from_secs(config.agent.pass_timeout_secs),
    ))
}

/// Initialize a new agent configuration.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing quaymaster configuration in: {}", path.display());

    let config_path = path.join("quaymaster.agent.yaml");
    let env_path = path.join(".env.example");

    // Check if files exist
    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    // Create directory if needed
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    // Write config template
    let config_template = include_str!("../templates/quaymaster.agent.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("Created: {}", config_path.display());

    // Write .env.example
    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    eprintln!("\nAgent configuration initialized!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and fill in your registry secrets");
    eprintln!("  2. Edit quaymaster.agent.yaml for your runtime and registries");
    eprintln!("  3. Run 'quaymaster validate' to check the configuration");
    eprintln!("  4. Run 'quaymaster plan --delta <file>' to preview a delta");
    eprintln!("  5. Run 'quaymaster run' to start the agent");

    Ok(())
}

/// Validate configuration (and the configured delta file, if any).
fn cmd_validate(config_path: Option<&PathBuf>, show_warnings: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let validator = ConfigValidator::new();

    let result = validator.validate(&config)?;
    eprintln!("Configuration is valid!");
    if show_warnings && !result.warnings.is_empty() {
        eprintln!("\nWarnings:");
        for warning in &result.warnings {
            eprintln!("  - {warning}");
        }
    }

    if let Some(delta_path) = &config.delta.path {
        let delta = load_delta_file(delta_path)?;
        let delta_result = validator.validate_delta(&delta)?;
        eprintln!("Delta document is valid ({} entries).", delta.len());
        if show_warnings && !delta_result.warnings.is_empty() {
            eprintln!("\nDelta warnings:");
            for warning in &delta_result.warnings {
                eprintln!("  - {warning}");
            }
        }
    }

    eprintln!("\nConfiguration summary:");
    eprintln!("  Agent: {}", config.agent.name);
    eprintln!("  Registries: {}", config.registries.len());
    eprintln!("  Pass timeout: {}s", config.agent.pass_timeout_secs);

    Ok(())
}

/// Compute and display the plan for a delta without applying it.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    delta_path: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let delta = load_delta(delta_path)?;

    let runtime = DockerRuntime::connect(&config.runtime)?;
    let running = runtime.list_running_containers().await?;
    let all = runtime.list_all_containers().await?;

    let plan = Planner::new().plan(&delta, &running, &all);
    eprintln!("{}", formatter.format_plan(&plan));

    Ok(())
}

/// Run a single reconciliation pass for a delta.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    delta_path: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let delta = load_delta(delta_path)?;

    let handler = build_handler(&config)?;
    let summary = handler.handle_delta(&delta).await;

    eprintln!("{}", formatter.format_summary(&summary));

    if summary.succeeded() {
        Ok(())
    } else {
        Err(QuaymasterError::internal(format!(
            "Reconciliation pass {} failed",
            summary.pass_id
        )))
    }
}

/// Show the local container inventory.
async fn cmd_status(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let config = load_config(config_path)?;

    let runtime = DockerRuntime::connect(&config.runtime)?;
    let records = runtime.list_all_containers().await?;

    eprintln!("{}", formatter.format_inventory(&records));

    Ok(())
}

/// Watch the delta file and reconcile on every change.
async fn cmd_run(
    config_path: Option<&PathBuf>,
    delta_override: Option<PathBuf>,
    interval_override: Option<u64>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let Some(delta_path) = delta_override.or_else(|| config.delta.path.clone()) else {
        return Err(QuaymasterError::internal(
            "No delta file configured; set delta.path or pass --delta",
        ));
    };

    let interval = interval_override.unwrap_or(config.delta.poll_interval_secs).max(1);

    let handler = build_handler(&config)?;
    let worker = AgentWorker::new(handler);

    let (feed, receiver) = DeltaFeed::channel();
    let poller = DeltaFilePoller::new(delta_path, Duration::from_secs(interval));
    let poller_task = tokio::spawn(poller.run(feed));

    info!("Agent '{}' running", config.agent.name);

    tokio::select! {
        () = worker.run(receiver) => {
            warn!("Delta feed closed unexpectedly");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received");
        }
    }

    poller_task.abort();
    Ok(())
}

/// Loads and validates a delta document.
fn load_delta(path: &Path) -> Result<DesiredSet> {
    let delta = load_delta_file(path)?;
    ConfigValidator::new().validate_delta(&delta)?;
    Ok(delta)
}
