// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Graph Domain Model
//!
//! A [`TaskGraph`] is a validated directed acyclic graph of [`TaskNode`]s.
//! Edges point from a task to the tasks it depends on; a task may start only
//! once every dependency has completed.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Task identity, node definition, DAG validation, task states
//!
//! # Invariants
//!
//! - Task ids are unique and non-empty.
//! - Every dependency names a task in the same graph.
//! - The dependency relation is acyclic; [`TaskGraph::new`] reports the first
//!   cycle found as an ordered path.
//!
//! | State | Stored | Meaning |
//! |-------|--------|---------|
//! | `Pending` | yes | waiting for at least one dependency |
//! | `Ready` | no | pending with all dependencies completed |
//! | `Running` | yes | claimed by a dispatcher |
//! | `Completed` | yes | terminal, output available |
//! | `Failed` | yes | terminal, dependents never become ready |

use crate::domain::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyTaskId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TaskId {
    type Error = ValidationError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        TaskId::new(id)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: TaskId,
    pub description: String,
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
    /// Higher runs first among tasks that are ready together.
    #[serde(default)]
    pub priority: i32,
    pub assigned_role: String,
}

impl TaskNode {
    pub fn new(id: TaskId, description: impl Into<String>, assigned_role: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            dependencies: BTreeSet::new(),
            priority: 0,
            assigned_role: assigned_role.into(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, dependency: TaskId) -> Self {
        self.dependencies.insert(dependency);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Ready => "ready",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal result reported for a running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    Failed,
}

impl From<TaskOutcome> for TaskState {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Completed => TaskState::Completed,
            TaskOutcome::Failed => TaskState::Failed,
        }
    }
}

/// Validated dependency DAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TaskNode>", into = "Vec<TaskNode>")]
pub struct TaskGraph {
    nodes: BTreeMap<TaskId, TaskNode>,
}

impl TaskGraph {
    pub fn new(nodes: impl IntoIterator<Item = TaskNode>) -> Result<Self, ValidationError> {
        let mut map = BTreeMap::new();
        for node in nodes {
            if map.contains_key(&node.id) {
                return Err(ValidationError::DuplicateTask(node.id));
            }
            map.insert(node.id.clone(), node);
        }
        if map.is_empty() {
            return Err(ValidationError::EmptyGraph);
        }

        for node in map.values() {
            if let Some(missing) = node.dependencies.iter().find(|d| !map.contains_key(*d)) {
                return Err(ValidationError::DanglingDependency {
                    task: node.id.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let graph = Self { nodes: map };
        if let Some(cycle) = graph.find_cycle() {
            return Err(ValidationError::CyclicDependency(cycle));
        }
        Ok(graph)
    }

    pub fn get(&self, id: &TaskId) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tasks that list `id` as a dependency.
    pub fn dependents(&self, id: &TaskId) -> Vec<&TaskNode> {
        self.nodes
            .values()
            .filter(|n| n.dependencies.contains(id))
            .collect()
    }

    /// Tasks nothing else depends on.
    pub fn sinks(&self) -> Vec<&TaskNode> {
        self.nodes
            .values()
            .filter(|n| !self.nodes.values().any(|m| m.dependencies.contains(&n.id)))
            .collect()
    }

    /// Depth-first search with three colours; returns the first back edge
    /// closed into a path such as `[a, b, c, a]`.
    fn find_cycle(&self) -> Option<Vec<TaskId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            id: &'a TaskId,
            graph: &'a TaskGraph,
            marks: &mut BTreeMap<&'a TaskId, Mark>,
            stack: &mut Vec<&'a TaskId>,
        ) -> Option<Vec<TaskId>> {
            marks.insert(id, Mark::Visiting);
            stack.push(id);

            if let Some(node) = graph.nodes.get(id) {
                for dep in &node.dependencies {
                    match marks.get(dep).copied() {
                        Some(Mark::Visiting) => {
                            let start = stack.iter().position(|s| *s == dep).unwrap_or(0);
                            let mut path: Vec<TaskId> =
                                stack[start..].iter().map(|s| (*s).clone()).collect();
                            path.push(dep.clone());
                            return Some(path);
                        }
                        Some(Mark::Done) => {}
                        None => {
                            if let Some(cycle) = visit(dep, graph, marks, stack) {
                                return Some(cycle);
                            }
                        }
                    }
                }
            }

            stack.pop();
            marks.insert(id, Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        let mut stack = Vec::new();
        for id in self.nodes.keys() {
            if !marks.contains_key(id) {
                if let Some(cycle) = visit(id, self, &mut marks, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }
}

impl TryFrom<Vec<TaskNode>> for TaskGraph {
    type Error = ValidationError;

    fn try_from(nodes: Vec<TaskNode>) -> Result<Self, Self::Error> {
        TaskGraph::new(nodes)
    }
}

impl From<TaskGraph> for Vec<TaskNode> {
    fn from(graph: TaskGraph) -> Self {
        graph.nodes.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        TaskId::new(s).unwrap()
    }

    fn node(s: &str, deps: &[&str]) -> TaskNode {
        deps.iter()
            .fold(TaskNode::new(id(s), format!("do {s}"), "worker"), |n, d| n.depends_on(id(d)))
    }

    #[test]
    fn test_valid_diamond() {
        let graph = TaskGraph::new(vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["a"]),
            node("d", &["b", "c"]),
        ])
        .unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.dependents(&id("a")).len(), 2);
        assert_eq!(graph.sinks().iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["d"]);
    }

    #[test]
    fn test_blank_task_id_rejected_when_deserialized() {
        assert!(serde_yaml::from_str::<TaskId>("\"\"").is_err());
        let yaml = "- id: \" \"\n  description: x\n  assigned_role: worker\n";
        assert!(serde_yaml::from_str::<TaskGraph>(yaml).is_err());

        let yaml = "- id: scan\n  description: x\n  assigned_role: worker\n";
        let graph: TaskGraph = serde_yaml::from_str(yaml).unwrap();
        assert!(graph.contains(&id("scan")));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = TaskGraph::new(vec![node("a", &[]), node("a", &[])]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateTask(id("a")));
    }

    #[test]
    fn test_dangling_dependency_rejected() {
        let err = TaskGraph::new(vec![node("a", &["ghost"])]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DanglingDependency {
                task: id("a"),
                dependency: id("ghost")
            }
        );
    }

    #[test]
    fn test_cycle_reports_path() {
        let err = TaskGraph::new(vec![
            node("a", &["c"]),
            node("b", &["a"]),
            node("c", &["b"]),
            node("d", &[]),
        ])
        .unwrap_err();
        match err {
            ValidationError::CyclicDependency(path) => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
                for t in ["a", "b", "c"] {
                    assert!(path.contains(&id(t)));
                }
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let err = TaskGraph::new(vec![node("a", &["a"])]).unwrap_err();
        assert_eq!(err, ValidationError::CyclicDependency(vec![id("a"), id("a")]));
    }

    #[test]
    fn test_empty_graph_rejected() {
        assert_eq!(TaskGraph::new(Vec::new()).unwrap_err(), ValidationError::EmptyGraph);
        assert_eq!(TaskId::new(" ").unwrap_err(), ValidationError::EmptyTaskId);
    }
}
