// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Task graph manifest commands
//!
//! - `vulnagent workflow validate <file>` - Parse and validate a manifest
//! - `vulnagent workflow show` - Print the built-in vulnerability management graph

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use vulnagent_core::domain::presets;
use vulnagent_core::domain::task_graph::TaskGraph;
use vulnagent_core::infrastructure::workflow_parser::TaskGraphParser;

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Validate a task graph manifest file
    Validate {
        /// Path to task graph manifest YAML file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show the built-in vulnerability management graph
    Show,
}

pub async fn handle_command(command: WorkflowCommand) -> Result<()> {
    match command {
        WorkflowCommand::Validate { file } => validate_workflow(file),
        WorkflowCommand::Show => {
            let graph = presets::vulnerability_management_graph()?;
            println!("{}", presets::WORKFLOW_ID.bold());
            print_tasks(&graph);
            Ok(())
        }
    }
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("{}", "Validating task graph manifest...".cyan());
    println!("   File: {}", file.display());
    println!();

    let definition = TaskGraphParser::parse_file(&file).context("Task graph validation failed")?;

    println!("{}", "✓ Task graph is valid!".green().bold());
    println!();
    println!("  Name:   {}", definition.name);
    if let Some(description) = &definition.description {
        println!("  About:  {}", description);
    }
    println!("  Agents: {}", definition.roster.len());
    println!("  Tasks:  {}", definition.graph.len());
    println!();
    print_tasks(&definition.graph);
    Ok(())
}

fn print_tasks(graph: &TaskGraph) {
    for node in graph.nodes() {
        let deps: Vec<&str> = node.dependencies.iter().map(|d| d.as_str()).collect();
        let after = if deps.is_empty() {
            String::new()
        } else {
            format!(" after {}", deps.join(", "))
        };
        println!(
            "  {} [{}] p{}{}",
            node.id.as_str().bold(),
            node.assigned_role,
            node.priority,
            after.dimmed()
        );
    }
}
