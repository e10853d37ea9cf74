// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # VulnAgent CLI
//!
//! The `vulnagent` binary drives multi-agent vulnerability management runs
//! in-process.
//!
//! ## Commands
//!
//! - `vulnagent run` - Execute a workflow, swarm or pipeline run
//! - `vulnagent workflow validate <file>` - Check a task graph manifest
//! - `vulnagent config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use vulnagent::commands::{self, ConfigCommand, RunArgs, WorkflowCommand};
use vulnagent_core::domain::config::OrchestratorConfigManifest;

/// VulnAgent - multi-agent vulnerability management orchestrator
#[derive(Parser)]
#[command(name = "vulnagent")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "VULNAGENT_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error) [default: from config, else info]
    #[arg(long, global = true, env = "VULNAGENT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (text, json) [default: from config, else text]
    #[arg(long, global = true, env = "VULNAGENT_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute an orchestration run
    #[command(name = "run")]
    Run(RunArgs),

    /// Task graph manifests
    #[command(name = "workflow")]
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Load errors surface again in the command itself.
    let logging = OrchestratorConfigManifest::load_or_default(cli.config.clone())
        .map(|manifest| manifest.logging())
        .unwrap_or_default()
        .with_overrides(cli.log_level.clone(), cli.log_format.clone());
    init_logging(&logging.level, &logging.format)?;

    match cli.command {
        Some(Commands::Run(args)) => commands::run::execute(args, cli.config).await,
        Some(Commands::Workflow { command }) => commands::workflow::handle_command(command).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        "text" => builder.compact().init(),
        other => anyhow::bail!("Unknown log format '{}'. Expected 'text' or 'json'", other),
    }

    Ok(())
}
