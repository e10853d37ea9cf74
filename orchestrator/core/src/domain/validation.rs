// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Validation errors raised before any agent is invoked.
//!
//! Submissions are checked up front (graph shape, role bindings, roster
//! membership, execution bounds); nothing is dispatched when one of these is
//! returned.

use crate::domain::agent::{AgentName, RosterError};
use crate::domain::task_graph::TaskId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task graph contains no tasks")]
    EmptyGraph,

    #[error("task id must not be empty")]
    EmptyTaskId,

    #[error("duplicate task id '{0}'")]
    DuplicateTask(TaskId),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    DanglingDependency { task: TaskId, dependency: TaskId },

    #[error("cyclic dependency: {}", render_cycle(.0))]
    CyclicDependency(Vec<TaskId>),

    #[error("task '{task}' requires role '{role}' but no agent is bound to it")]
    UnboundRole { task: TaskId, role: String },

    #[error("entry agent '{0}' is not in the roster")]
    UnknownEntryAgent(AgentName),

    #[error("invalid execution bounds: {0}")]
    InvalidBounds(String),

    #[error(transparent)]
    Roster(#[from] RosterError),
}

fn render_cycle(path: &[TaskId]) -> String {
    path.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
