// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Run Requests and Results
//!
//! Entry payload of a run, the per-phase results produced by the task graph
//! runner and the swarm controller, and the aggregated
//! [`OrchestrationResult`] returned to callers.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Run identity, abort reasons, phase and run outcomes

use crate::domain::checkpoint::HumanCheckpoint;
use crate::domain::handoff::HandoffEvent;
use crate::domain::invoker::NodeFailure;
use crate::domain::knowledge::MemoryRecord;
use crate::domain::task_graph::{TaskId, TaskState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a run request is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Fixed task graph only.
    #[default]
    Workflow,
    /// Free handoff swarm only.
    Swarm,
    /// Task graph first, then a swarm seeded with the graph's output.
    Pipeline,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunMode::Workflow => "workflow",
            RunMode::Swarm => "swarm",
            RunMode::Pipeline => "pipeline",
        };
        f.write_str(s)
    }
}

pub const DEFAULT_PROMPT: &str = "Analyze vulnerability status";

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

/// Entry payload accepted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default = "default_prompt")]
    pub prompt: String,
    #[serde(default, alias = "workflow_mode", deserialize_with = "deserialize_mode")]
    pub mode: RunMode,
}

/// Accepts a mode name or the boolean `workflow_mode` flag, where `true`
/// selects the task graph and `false` the free swarm.
fn deserialize_mode<'de, D>(deserializer: D) -> Result<RunMode, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ModeRepr {
        Flag(bool),
        Named(RunMode),
    }

    Ok(match ModeRepr::deserialize(deserializer)? {
        ModeRepr::Flag(true) => RunMode::Workflow,
        ModeRepr::Flag(false) => RunMode::Swarm,
        ModeRepr::Named(mode) => mode,
    })
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            mode: RunMode::default(),
        }
    }
}

/// Why a phase stopped before producing a normal completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    HandoffLimitExceeded { limit: u32 },
    IterationLimitExceeded { limit: u32 },
    ExecutionTimeout {
        #[serde(with = "humantime_serde")]
        budget: Duration,
    },
    RepetitiveHandoffDetected {
        window: usize,
        unique_agents: usize,
        required: usize,
    },
    NoUsableOutput,
    Cancelled,
}

impl AbortReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AbortReason::HandoffLimitExceeded { .. } => "handoff_limit_exceeded",
            AbortReason::IterationLimitExceeded { .. } => "iteration_limit_exceeded",
            AbortReason::ExecutionTimeout { .. } => "execution_timeout",
            AbortReason::RepetitiveHandoffDetected { .. } => "repetitive_handoff_detected",
            AbortReason::NoUsableOutput => "no_usable_output",
            AbortReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::HandoffLimitExceeded { limit } => {
                write!(f, "handoff limit of {limit} exceeded")
            }
            AbortReason::IterationLimitExceeded { limit } => {
                write!(f, "iteration limit of {limit} exceeded")
            }
            AbortReason::ExecutionTimeout { budget } => {
                write!(f, "execution budget of {budget:?} exhausted")
            }
            AbortReason::RepetitiveHandoffDetected {
                window,
                unique_agents,
                required,
            } => write!(
                f,
                "repetitive handoff: {unique_agents} unique agent(s) in last {window} handoffs, {required} required"
            ),
            AbortReason::NoUsableOutput => f.write_str("no agent produced usable output"),
            AbortReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    TaskGraph,
    Swarm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    Suspended,
    Aborted { reason: AbortReason },
    Failed { error: String },
}

/// Per-phase detail kept for inspection after the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseDiagnostics {
    TaskGraph {
        task_states: BTreeMap<TaskId, TaskState>,
        task_outputs: BTreeMap<TaskId, String>,
        failures: Vec<NodeFailure>,
    },
    Swarm {
        handoffs: Vec<HandoffEvent>,
        iterations: u32,
        #[serde(with = "humantime_serde")]
        elapsed: Duration,
        failures: Vec<NodeFailure>,
        stored_records: Vec<MemoryRecord>,
        unapproved_records: Vec<MemoryRecord>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub name: String,
    pub kind: PhaseKind,
    /// A required phase without output fails the whole run.
    pub required: bool,
    pub status: PhaseStatus,
    pub output: Option<String>,
    pub diagnostics: PhaseDiagnostics,
}

impl PhaseResult {
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, PhaseStatus::Aborted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    Completed,
    AwaitingHumanInput,
    Failed,
}

impl fmt::Display for OrchestrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrchestrationStatus::Completed => "completed",
            OrchestrationStatus::AwaitingHumanInput => "awaiting_human_input",
            OrchestrationStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub run_id: RunId,
    pub status: OrchestrationStatus,
    pub phases: Vec<PhaseResult>,
    pub checkpoint: Option<HumanCheckpoint>,
}

impl OrchestrationResult {
    /// Output of the last phase that produced one.
    pub fn final_output(&self) -> Option<&str> {
        self.phases.iter().rev().find_map(|p| p.output.as_deref())
    }
}
