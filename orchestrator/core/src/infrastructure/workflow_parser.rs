// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Task Graph YAML Parser
//!
//! Parses task graph manifests into a validated [`TaskGraph`], the agent
//! roster and the role bindings that connect them.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse external YAML → Domain objects
//! - **Anti-Corruption:** Translates YAML schema to domain model
//!
//! # Manifest Format
//!
//! ```yaml
//! apiVersion: vulnagent.dev/v1
//! kind: TaskGraph
//! metadata:
//!   name: vulnerability-management
//! spec:
//!   agents:
//!     - name: gatherer
//!       role_prompt: "Triage scanner findings"
//!     - name: remediator
//!       role_prompt: "Plan fixes"
//!   bindings:
//!     planner: remediator
//!   tasks:
//!     - id: gather
//!       description: Gather findings
//!       role: gatherer
//!       priority: 5
//!     - id: plan
//!       description: Plan remediation
//!       role: planner
//!       depends_on: [gather]
//! ```
//!
//! A role with no explicit binding resolves to the agent of the same name.

use crate::domain::agent::{AgentIdentity, AgentName, RoleBindings, Roster};
use crate::domain::config::API_VERSION;
use crate::domain::task_graph::{TaskGraph, TaskId, TaskNode};
use crate::domain::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const TASK_GRAPH_KIND: &str = "TaskGraph";

// ============================================================================
// YAML Schema (External Representation)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGraphManifest {
    pub api_version: String,
    pub kind: String,
    pub metadata: TaskGraphMetadataYaml,
    pub spec: TaskGraphSpecYaml,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGraphMetadataYaml {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGraphSpecYaml {
    pub agents: Vec<AgentYaml>,
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
    pub tasks: Vec<TaskYaml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentYaml {
    pub name: String,
    pub role_prompt: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskYaml {
    pub id: String,
    pub description: String,
    pub role: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

// ============================================================================
// Domain result
// ============================================================================

/// A parsed, fully validated task graph definition.
#[derive(Debug, Clone)]
pub struct TaskGraphDefinition {
    pub name: String,
    pub description: Option<String>,
    pub graph: TaskGraph,
    pub roster: Roster,
    pub bindings: RoleBindings,
}

// ============================================================================
// Parser
// ============================================================================

pub struct TaskGraphParser;

impl TaskGraphParser {
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<TaskGraphDefinition, TaskGraphParseError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| TaskGraphParseError::IoError {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse_yaml(&content)
    }

    pub fn parse_yaml(yaml: &str) -> Result<TaskGraphDefinition, TaskGraphParseError> {
        let manifest: TaskGraphManifest =
            serde_yaml::from_str(yaml).map_err(|e| TaskGraphParseError::YamlError(e.to_string()))?;
        Self::validate_and_convert(manifest)
    }

    fn validate_and_convert(manifest: TaskGraphManifest) -> Result<TaskGraphDefinition, TaskGraphParseError> {
        if manifest.api_version != API_VERSION {
            return Err(TaskGraphParseError::InvalidApiVersion {
                expected: API_VERSION.to_string(),
                got: manifest.api_version,
            });
        }
        if manifest.kind != TASK_GRAPH_KIND {
            return Err(TaskGraphParseError::InvalidKind {
                expected: TASK_GRAPH_KIND.to_string(),
                got: manifest.kind,
            });
        }

        let agents = manifest
            .spec
            .agents
            .into_iter()
            .map(Self::convert_agent)
            .collect::<Result<Vec<_>, _>>()?;
        let roster = Roster::new(agents).map_err(ValidationError::from)?;

        let nodes = manifest
            .spec
            .tasks
            .into_iter()
            .map(Self::convert_task)
            .collect::<Result<Vec<_>, _>>()?;
        let graph = TaskGraph::new(nodes)?;

        let bindings = Self::resolve_bindings(&graph, &roster, &manifest.spec.bindings)?;
        bindings.check(&graph)?;

        Ok(TaskGraphDefinition {
            name: manifest.metadata.name,
            description: manifest.metadata.description,
            graph,
            roster,
            bindings,
        })
    }

    fn convert_agent(yaml: AgentYaml) -> Result<AgentIdentity, TaskGraphParseError> {
        let name = AgentName::new(yaml.name).map_err(ValidationError::from)?;
        Ok(AgentIdentity::new(name, yaml.role_prompt).with_capabilities(yaml.capabilities))
    }

    fn convert_task(yaml: TaskYaml) -> Result<TaskNode, TaskGraphParseError> {
        let dependencies = yaml
            .depends_on
            .into_iter()
            .map(TaskId::new)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(TaskNode {
            id: TaskId::new(yaml.id)?,
            description: yaml.description,
            dependencies,
            priority: yaml.priority,
            assigned_role: yaml.role,
        })
    }

    fn resolve_bindings(
        graph: &TaskGraph,
        roster: &Roster,
        explicit: &BTreeMap<String, String>,
    ) -> Result<RoleBindings, TaskGraphParseError> {
        let mut bindings = RoleBindings::new();
        let roles: BTreeSet<&str> = graph.nodes().map(|n| n.assigned_role.as_str()).collect();

        for role in roles {
            let agent_name = explicit.get(role).map(String::as_str).unwrap_or(role);
            let lookup = AgentName::new(agent_name).map_err(ValidationError::from)?;
            match roster.get(&lookup) {
                Some(agent) => bindings.insert(role, agent.clone()),
                None if explicit.contains_key(role) => {
                    return Err(TaskGraphParseError::UnknownAgent {
                        role: role.to_string(),
                        agent: agent_name.to_string(),
                    })
                }
                // left unbound, reported by RoleBindings::check
                None => {}
            }
        }
        Ok(bindings)
    }
}

#[derive(Debug, Error)]
pub enum TaskGraphParseError {
    #[error("IO error reading {path}: {error}")]
    IoError { path: String, error: String },

    #[error("YAML parse error: {0}")]
    YamlError(String),

    #[error("Invalid API version: expected '{expected}', got '{got}'")]
    InvalidApiVersion { expected: String, got: String },

    #[error("Invalid kind: expected '{expected}', got '{got}'")]
    InvalidKind { expected: String, got: String },

    #[error("role '{role}' is bound to unknown agent '{agent}'")]
    UnknownAgent { role: String, agent: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
apiVersion: vulnagent.dev/v1
kind: TaskGraph
metadata:
  name: vuln-mgmt
spec:
  agents:
    - name: gatherer
      role_prompt: "triage"
      capabilities: [triage]
    - name: remediator
      role_prompt: "plan"
  bindings:
    planner: remediator
  tasks:
    - id: gather
      description: Gather findings
      role: gatherer
      priority: 5
    - id: plan
      description: Plan remediation
      role: planner
      depends_on: [gather]
"#;

    #[test]
    fn test_parse_manifest() {
        let def = TaskGraphParser::parse_yaml(MANIFEST).unwrap();
        assert_eq!(def.name, "vuln-mgmt");
        assert_eq!(def.graph.len(), 2);
        assert_eq!(def.roster.len(), 2);
        assert_eq!(def.bindings.resolve("planner").unwrap().name.as_str(), "remediator");
        assert_eq!(def.bindings.resolve("gatherer").unwrap().name.as_str(), "gatherer");
    }

    #[test]
    fn test_wrong_kind() {
        let yaml = MANIFEST.replace("kind: TaskGraph", "kind: Workflow");
        assert!(matches!(
            TaskGraphParser::parse_yaml(&yaml),
            Err(TaskGraphParseError::InvalidKind { .. })
        ));
    }

    #[test]
    fn test_cycle_surfaces_as_validation_error() {
        let yaml = MANIFEST.replace("priority: 5", "priority: 5\n      depends_on: [plan]");
        assert!(matches!(
            TaskGraphParser::parse_yaml(&yaml),
            Err(TaskGraphParseError::Validation(ValidationError::CyclicDependency(_)))
        ));
    }

    #[test]
    fn test_unbound_role() {
        let yaml = MANIFEST.replace("  bindings:\n    planner: remediator\n", "");
        assert!(matches!(
            TaskGraphParser::parse_yaml(&yaml),
            Err(TaskGraphParseError::Validation(ValidationError::UnboundRole { .. }))
        ));
    }

    #[test]
    fn test_binding_to_unknown_agent() {
        let yaml = MANIFEST.replace("planner: remediator", "planner: ghost");
        assert!(matches!(
            TaskGraphParser::parse_yaml(&yaml),
            Err(TaskGraphParseError::UnknownAgent { .. })
        ));
    }
}
