// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `vulnagent run` - execute an orchestration run against scripted agents
//!
//! Human checkpoints are answered from `--human-response` values in order.
//! When the answers run out the run stays suspended until the process exits;
//! checkpoints are held in memory only.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::orchestrator::Orchestrator;
use vulnagent_core::domain::checkpoint::{HumanCheckpoint, HumanResponse};
use vulnagent_core::domain::config::OrchestratorConfigManifest;
use vulnagent_core::domain::knowledge::VulnerabilitySignature;
use vulnagent_core::domain::result::{
    OrchestrationResult, OrchestrationStatus, PhaseDiagnostics, PhaseStatus, RunMode, RunRequest,
    DEFAULT_PROMPT,
};
use vulnagent_core::infrastructure::scripted_invoker::ScriptedInvoker;
use vulnagent_core::infrastructure::workflow_parser::TaskGraphParser;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Workflow,
    Swarm,
    Pipeline,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Workflow => RunMode::Workflow,
            ModeArg::Swarm => RunMode::Swarm,
            ModeArg::Pipeline => RunMode::Pipeline,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Execution mode
    #[arg(long, short = 'm', value_enum, default_value = "workflow")]
    pub mode: ModeArg,

    /// Prompt handed to the first agent
    #[arg(long, short = 'p', default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// Agent script (YAML map of agent name to turns)
    #[arg(long, short = 's', value_name = "FILE")]
    pub script: PathBuf,

    /// Task graph manifest replacing the built-in graph and roster
    #[arg(long, short = 'g', value_name = "FILE")]
    pub graph: Option<PathBuf>,

    /// Answer for the next human checkpoint (repeatable)
    #[arg(long = "human-response", short = 'r', value_name = "TEXT")]
    pub human_responses: Vec<String>,

    /// Vulnerability signature used to look up prior remediations
    #[arg(long, value_name = "SIGNATURE")]
    pub signature: Option<String>,

    /// Output format
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    pub output: OutputFormat,
}

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = OrchestratorConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let invoker = Arc::new(ScriptedInvoker::from_yaml_file(&args.script)?);
    let mut orchestrator = Orchestrator::new(invoker, &config.spec)?;
    if let Some(path) = &args.graph {
        let definition = TaskGraphParser::parse_file(path).context("Failed to load task graph")?;
        orchestrator = orchestrator.with_definition(definition);
    }

    let request = RunRequest {
        prompt: args.prompt,
        mode: args.mode.into(),
    };
    let signature = args.signature.map(VulnerabilitySignature::new);
    let result = drive(&orchestrator, request, signature, args.human_responses).await?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_result(&result),
    }
    if result.status == OrchestrationStatus::Failed {
        std::process::exit(2);
    }
    Ok(())
}

/// Submit `request` and answer checkpoints until the run settles or the
/// answers are used up.
pub async fn drive(
    orchestrator: &Orchestrator,
    request: RunRequest,
    signature: Option<VulnerabilitySignature>,
    responses: Vec<String>,
) -> Result<OrchestrationResult> {
    let mut answers: VecDeque<String> = responses.into();
    let mut result = orchestrator.submit(request, signature).await?;

    while result.status == OrchestrationStatus::AwaitingHumanInput {
        let (Some(checkpoint), Some(answer)) = (result.checkpoint.clone(), answers.pop_front()) else {
            break;
        };
        info!(requested_by = %checkpoint.requested_by, "Answering checkpoint");
        result = orchestrator
            .resume(&checkpoint.resumption_token, HumanResponse::new(answer))
            .await?;
    }
    Ok(result)
}

fn print_result(result: &OrchestrationResult) {
    let status = match result.status {
        OrchestrationStatus::Completed => result.status.to_string().green().bold(),
        OrchestrationStatus::AwaitingHumanInput => result.status.to_string().yellow().bold(),
        OrchestrationStatus::Failed => result.status.to_string().red().bold(),
    };
    println!("Run {} {}", result.run_id, status);
    println!();

    for phase in &result.phases {
        let state = match &phase.status {
            PhaseStatus::Completed => "completed".green().to_string(),
            PhaseStatus::Suspended => "suspended".yellow().to_string(),
            PhaseStatus::Aborted { reason } => format!("aborted: {reason}").red().to_string(),
            PhaseStatus::Failed { error } => format!("failed: {error}").red().to_string(),
        };
        println!("{} {}", phase.name.bold(), state);
        match &phase.diagnostics {
            PhaseDiagnostics::TaskGraph { task_states, failures, .. } => {
                for (task, task_state) in task_states {
                    println!("  {task}: {task_state}");
                }
                for failure in failures {
                    println!("  {} {}", "!".red(), failure.error);
                }
            }
            PhaseDiagnostics::Swarm {
                handoffs,
                iterations,
                failures,
                stored_records,
                ..
            } => {
                for handoff in handoffs {
                    println!("  #{} {} -> {}", handoff.sequence, handoff.from_agent, handoff.to_agent);
                }
                println!("  iterations: {iterations}");
                if !stored_records.is_empty() {
                    println!("  stored knowledge records: {}", stored_records.len());
                }
                for failure in failures {
                    println!("  {} {}", "!".red(), failure.error);
                }
            }
        }
    }

    if let Some(checkpoint) = &result.checkpoint {
        println!();
        println!("{}", "Awaiting human input".yellow().bold());
        for line in checkpoint_notice(checkpoint) {
            println!("{line}");
        }
    }
    if let Some(output) = result.final_output() {
        println!();
        println!("{}", "Output:".bold());
        println!("{output}");
    }
}

/// Checkpoints live in this process only, so the token is useless once it
/// exits. Point at `--human-response` instead.
fn checkpoint_notice(checkpoint: &HumanCheckpoint) -> Vec<String> {
    vec![
        format!("  From:    {}", checkpoint.requested_by),
        format!("  Message: {}", checkpoint.pending_message),
        "  The run is discarded when this command exits.".to_string(),
        "  Re-run with one more --human-response value to answer this checkpoint.".to_string(),
    ]
}
