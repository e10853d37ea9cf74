// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::agent::AgentName;
use crate::domain::checkpoint::ConversationId;
use crate::domain::handoff::HandoffEvent;
use crate::domain::result::{AbortReason, OrchestrationStatus, RunId, RunMode};
use crate::domain::task_graph::{TaskId, TaskOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task graph progress
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    TaskDispatched {
        run_id: RunId,
        task_id: TaskId,
        agent: AgentName,
        dispatched_at: DateTime<Utc>,
    },
    TaskReported {
        run_id: RunId,
        task_id: TaskId,
        outcome: TaskOutcome,
        reported_at: DateTime<Utc>,
    },
}

/// Swarm progress
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwarmEvent {
    AgentInvoked {
        run_id: RunId,
        agent: AgentName,
        iteration: u32,
        invoked_at: DateTime<Utc>,
    },
    HandoffRecorded {
        run_id: RunId,
        handoff: HandoffEvent,
    },
}

/// Run lifecycle, including human checkpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: RunId,
        mode: RunMode,
        started_at: DateTime<Utc>,
    },
    RunSuspended {
        run_id: RunId,
        conversation_id: ConversationId,
        requested_by: AgentName,
        suspended_at: DateTime<Utc>,
    },
    RunResumed {
        run_id: RunId,
        conversation_id: ConversationId,
        resumed_at: DateTime<Utc>,
    },
    PhaseAborted {
        run_id: RunId,
        phase: String,
        reason: AbortReason,
        aborted_at: DateTime<Utc>,
    },
    RunFinished {
        run_id: RunId,
        status: OrchestrationStatus,
        finished_at: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            TaskEvent::TaskDispatched { run_id, .. } | TaskEvent::TaskReported { run_id, .. } => {
                *run_id
            }
        }
    }
}

impl SwarmEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            SwarmEvent::AgentInvoked { run_id, .. } | SwarmEvent::HandoffRecorded { run_id, .. } => {
                *run_id
            }
        }
    }
}

impl RunEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::RunSuspended { run_id, .. }
            | RunEvent::RunResumed { run_id, .. }
            | RunEvent::PhaseAborted { run_id, .. }
            | RunEvent::RunFinished { run_id, .. } => *run_id,
        }
    }
}
