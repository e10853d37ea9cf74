// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use vulnagent_core::domain::config::{OrchestratorConfigManifest, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with default values
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./vulnagent-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, force } => generate(output, force),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = OrchestratorConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./vulnagent-config.yaml");
        println!("  4. ~/.vulnagent/config.yaml");
        println!("  5. /etc/vulnagent/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Swarm:".bold());
    println!("  Max handoffs:      {}", spec.swarm.max_handoffs);
    println!("  Max iterations:    {}", spec.swarm.max_iterations);
    println!("  Execution timeout: {:?}", spec.swarm.execution_timeout);
    println!("  Node timeout:      {:?}", spec.swarm.node_timeout);
    if spec.swarm.detection_enabled() {
        println!(
            "  Repetition guard:  {} unique in last {} handoffs",
            spec.swarm.repetitive_handoff_min_unique_agents, spec.swarm.repetitive_handoff_detection_window
        );
    } else {
        println!("  Repetition guard:  {}", "disabled".dimmed());
    }
    println!();

    println!("{}", "Task graph:".bold());
    println!("  Execution timeout: {:?}", spec.workflow.execution_timeout);
    println!("  Node timeout:      {:?}", spec.workflow.node_timeout);
    println!("  Max parallel:      {}", spec.workflow.max_parallel_tasks);
    println!();

    println!("{}", "Knowledge:".bold());
    println!("  Enabled:  {}", spec.knowledge.enabled);
    println!("  Actor:    {}", spec.knowledge.actor_id);
    match spec.checkpoints.ttl {
        Some(ttl) => println!("  Checkpoint TTL: {:?}", ttl),
        None => println!("  Checkpoint TTL: {}", "none".dimmed()),
    }

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OrchestratorConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", output.display());
    }
    OrchestratorConfigManifest::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );
    Ok(())
}
