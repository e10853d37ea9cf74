// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Dependency Scheduler
//!
//! Tracks the state of every task in a submitted [`TaskGraph`] and hands out
//! tasks whose dependencies have all completed.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Readiness computation, claim/report state machine
//!
//! Transitions:
//!
//! ```text
//! Pending ──(deps completed)──▶ Ready ──claim──▶ Running ──report──▶ Completed | Failed
//! ```
//!
//! `Ready` is derived on read and never stored. A failed task leaves its
//! dependents `Pending` for good; they are reported as blocked.

use crate::domain::task_graph::{TaskGraph, TaskId, TaskNode, TaskOutcome, TaskState};
use crate::domain::validation::ValidationError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("unknown task '{0}'")]
    UnknownTask(TaskId),

    #[error("task '{task}' cannot move from {from} to {to}")]
    InvalidTransition {
        task: TaskId,
        from: TaskState,
        to: TaskState,
    },
}

/// Point-in-time copy of every task's state, `Ready` included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub states: BTreeMap<TaskId, TaskState>,
}

impl SchedulerSnapshot {
    pub fn state(&self, id: &TaskId) -> Option<TaskState> {
        self.states.get(id).copied()
    }

    pub fn count(&self, state: TaskState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }
}

/// Tasks that were ready when the batch was taken, highest priority first
/// and ties broken by id. Entries still need a successful
/// [`DependencyScheduler::claim`] before dispatch.
#[derive(Debug)]
pub struct ReadyBatch {
    inner: std::vec::IntoIter<TaskNode>,
}

impl Iterator for ReadyBatch {
    type Item = TaskNode;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ReadyBatch {}

#[derive(Debug)]
pub struct DependencyScheduler {
    graph: TaskGraph,
    states: Mutex<BTreeMap<TaskId, TaskState>>,
}

impl DependencyScheduler {
    /// Validate `nodes` as a DAG and start every task `Pending`.
    pub fn submit(nodes: impl IntoIterator<Item = TaskNode>) -> Result<Self, ValidationError> {
        Ok(Self::from_graph(TaskGraph::new(nodes)?))
    }

    pub fn from_graph(graph: TaskGraph) -> Self {
        let states = graph
            .ids()
            .map(|id| (id.clone(), TaskState::Pending))
            .collect();
        Self {
            graph,
            states: Mutex::new(states),
        }
    }

    /// Rebuild a scheduler from a snapshot taken on the same graph.
    ///
    /// `Ready` entries are stored back as `Pending`; ids missing from the
    /// snapshot start `Pending`.
    pub fn restore(graph: TaskGraph, snapshot: &SchedulerSnapshot) -> Self {
        let states = graph
            .ids()
            .map(|id| {
                let state = match snapshot.state(id) {
                    Some(TaskState::Ready) | None => TaskState::Pending,
                    Some(other) => other,
                };
                (id.clone(), state)
            })
            .collect();
        Self {
            graph,
            states: Mutex::new(states),
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn next_ready_batch(&self) -> ReadyBatch {
        let states = self.states.lock();
        let mut ready: Vec<TaskNode> = self
            .graph
            .nodes()
            .filter(|node| Self::is_ready(&states, node))
            .cloned()
            .collect();
        ready.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        ReadyBatch {
            inner: ready.into_iter(),
        }
    }

    /// Atomically move a ready task to `Running`.
    ///
    /// Returns `Ok(false)` when the task is not ready, including when another
    /// dispatcher claimed it first.
    pub fn claim(&self, id: &TaskId) -> Result<bool, SchedulerError> {
        let node = self
            .graph
            .get(id)
            .ok_or_else(|| SchedulerError::UnknownTask(id.clone()))?;

        let mut states = self.states.lock();
        if !Self::is_ready(&states, node) {
            return Ok(false);
        }
        states.insert(id.clone(), TaskState::Running);
        debug!(task_id = %id, "Task claimed");
        Ok(true)
    }

    /// Record the terminal outcome of a running task.
    ///
    /// Repeating the outcome a task already has is a no-op; any other report
    /// on a task that is not `Running` is rejected.
    pub fn report(&self, id: &TaskId, outcome: TaskOutcome) -> Result<(), SchedulerError> {
        let mut states = self.states.lock();
        let current = *states
            .get(id)
            .ok_or_else(|| SchedulerError::UnknownTask(id.clone()))?;
        let target = TaskState::from(outcome);

        match current {
            TaskState::Running => {
                states.insert(id.clone(), target);
                debug!(task_id = %id, state = %target, "Task reported");
                Ok(())
            }
            same if same == target => Ok(()),
            other => {
                warn!(task_id = %id, from = %other, to = %target, "Rejected task report");
                Err(SchedulerError::InvalidTransition {
                    task: id.clone(),
                    from: self.effective_state(&states, id, other),
                    to: target,
                })
            }
        }
    }

    pub fn state(&self, id: &TaskId) -> Option<TaskState> {
        let states = self.states.lock();
        let stored = *states.get(id)?;
        Some(self.effective_state(&states, id, stored))
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let states = self.states.lock();
        SchedulerSnapshot {
            states: states
                .iter()
                .map(|(id, stored)| (id.clone(), self.effective_state(&states, id, *stored)))
                .collect(),
        }
    }

    /// Number of tasks currently `Running`.
    pub fn running(&self) -> usize {
        self.states
            .lock()
            .values()
            .filter(|s| **s == TaskState::Running)
            .count()
    }

    /// No task is running and none can become ready.
    pub fn is_settled(&self) -> bool {
        let states = self.states.lock();
        !states.values().any(|s| *s == TaskState::Running)
            && !self.graph.nodes().any(|n| Self::is_ready(&states, n))
    }

    /// Pending tasks that can never run because an ancestor failed.
    pub fn blocked(&self) -> Vec<TaskId> {
        let states = self.states.lock();
        self.graph
            .nodes()
            .filter(|n| states.get(&n.id) == Some(&TaskState::Pending))
            .filter(|n| self.has_failed_ancestor(&states, n))
            .map(|n| n.id.clone())
            .collect()
    }

    fn effective_state(
        &self,
        states: &BTreeMap<TaskId, TaskState>,
        id: &TaskId,
        stored: TaskState,
    ) -> TaskState {
        match (stored, self.graph.get(id)) {
            (TaskState::Pending, Some(node)) if Self::is_ready(states, node) => TaskState::Ready,
            _ => stored,
        }
    }

    fn is_ready(states: &BTreeMap<TaskId, TaskState>, node: &TaskNode) -> bool {
        states.get(&node.id) == Some(&TaskState::Pending)
            && node
                .dependencies
                .iter()
                .all(|dep| states.get(dep) == Some(&TaskState::Completed))
    }

    fn has_failed_ancestor(&self, states: &BTreeMap<TaskId, TaskState>, node: &TaskNode) -> bool {
        let mut stack: Vec<&TaskId> = node.dependencies.iter().collect();
        let mut seen = std::collections::BTreeSet::new();
        while let Some(dep) = stack.pop() {
            if !seen.insert(dep) {
                continue;
            }
            if states.get(dep) == Some(&TaskState::Failed) {
                return true;
            }
            if let Some(parent) = self.graph.get(dep) {
                stack.extend(parent.dependencies.iter());
            }
        }
        false
    }
}
