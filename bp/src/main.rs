//! Backport - replicate commits onto many branches
//!
//! CLI entry point: loads configuration, runs the configured steps against the working
//! directory and prints a summary.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, error, info};

use backport::cli::{Cli, OutputFormat, get_log_path};
use backport::config::Config;
use backport::{Error, GitCli, Orchestrator, RunSummary, Settings, TerminalPrompter, WorkspaceSession};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config).map_err(|e| eyre::eyre!(e))?;
    let settings = Settings::from_config(&config)?;
    info!(
        workdir = %settings.workdir.display(),
        steps = config.steps.len(),
        "Backport loaded config"
    );

    let git = GitCli::new(&settings.workdir);
    let session = WorkspaceSession::new(&git);
    let prompter = TerminalPrompter::new()?;
    let orchestrator = Orchestrator::new(&session, &prompter, settings);

    let summary = match orchestrator.run(&config.steps) {
        Ok(summary) => summary,
        Err(Error::Cancelled) => {
            info!("Run cancelled by operator");
            eprintln!("{} Cancelled", "✗".red());
            process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            eprintln!("{} {}", "✗".red(), format!("Run aborted: {}", e).red());
            process::exit(1);
        }
    };

    print_summary(&summary, cli.format)?;
    debug!(succeeded = summary.succeeded(), "main: run finished");
    if !summary.succeeded() {
        process::exit(1);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!();
            print!("{}", summary);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
    }
    Ok(())
}
