// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Domain Model
//!
//! Identities of the specialized agents that take part in a run, the roster
//! that groups them, the role bindings used by task graphs, and the tagged
//! [`AgentTurn`] every invocation returns.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Agent identity, roster membership, turn outcomes
//!
//! An agent is identified purely by its [`AgentName`]. The orchestrator never
//! inspects prompts or capability tags beyond routing; the language model
//! behind an agent lives on the far side of the
//! [`AgentInvoker`](crate::domain::invoker::AgentInvoker) seam.

use crate::domain::knowledge::MemoryRecord;
use crate::domain::task_graph::TaskGraph;
use crate::domain::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;

/// Unique, non-empty agent name within a [`Roster`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(String);

impl AgentName {
    pub fn new(name: impl Into<String>) -> Result<Self, RosterError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RosterError::EmptyName);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AgentName {
    type Error = RosterError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        AgentName::new(name)
    }
}

impl From<AgentName> for String {
    fn from(name: AgentName) -> Self {
        name.0
    }
}

/// A specialized agent: a name, the role prompt handed to the model, and
/// free-form capability tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub name: AgentName,
    pub role_prompt: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub capability_tags: BTreeSet<String>,
}

impl AgentIdentity {
    pub fn new(name: AgentName, role_prompt: impl Into<String>) -> Self {
        Self {
            name,
            role_prompt: role_prompt.into(),
            capability_tags: BTreeSet::new(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capability_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn has_capability(&self, tag: &str) -> bool {
        self.capability_tags.contains(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("agent name must not be empty")]
    EmptyName,

    #[error("roster must contain at least one agent")]
    EmptyRoster,

    #[error("duplicate agent '{0}' in roster")]
    DuplicateAgent(AgentName),
}

/// Ordered set of agents participating in a run.
///
/// # Invariants
///
/// - At least one agent.
/// - Agent names are unique.
/// - Insertion order is preserved; the first agent is the default entry point
///   of a swarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AgentIdentity>", into = "Vec<AgentIdentity>")]
pub struct Roster {
    agents: Vec<AgentIdentity>,
}

impl Roster {
    pub fn new(agents: Vec<AgentIdentity>) -> Result<Self, RosterError> {
        if agents.is_empty() {
            return Err(RosterError::EmptyRoster);
        }
        let mut seen = HashSet::with_capacity(agents.len());
        for agent in &agents {
            if !seen.insert(agent.name.clone()) {
                return Err(RosterError::DuplicateAgent(agent.name.clone()));
            }
        }
        Ok(Self { agents })
    }

    pub fn get(&self, name: &AgentName) -> Option<&AgentIdentity> {
        self.agents.iter().find(|a| &a.name == name)
    }

    pub fn contains(&self, name: &AgentName) -> bool {
        self.get(name).is_some()
    }

    /// Default entry agent.
    pub fn entry(&self) -> &AgentIdentity {
        // Non-empty by construction.
        &self.agents[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentIdentity> {
        self.agents.iter()
    }

    pub fn names(&self) -> Vec<AgentName> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl TryFrom<Vec<AgentIdentity>> for Roster {
    type Error = RosterError;

    fn try_from(agents: Vec<AgentIdentity>) -> Result<Self, Self::Error> {
        Roster::new(agents)
    }
}

impl From<Roster> for Vec<AgentIdentity> {
    fn from(roster: Roster) -> Self {
        roster.agents
    }
}

/// Maps the abstract role named on a task node to a concrete agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleBindings(BTreeMap<String, AgentIdentity>);

impl RoleBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, role: impl Into<String>, agent: AgentIdentity) -> Self {
        self.0.insert(role.into(), agent);
        self
    }

    pub fn insert(&mut self, role: impl Into<String>, agent: AgentIdentity) {
        self.0.insert(role.into(), agent);
    }

    pub fn resolve(&self, role: &str) -> Option<&AgentIdentity> {
        self.0.get(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Every task's role must resolve to an agent.
    pub fn check(&self, graph: &TaskGraph) -> Result<(), ValidationError> {
        match graph.nodes().find(|n| self.resolve(&n.assigned_role).is_none()) {
            Some(node) => Err(ValidationError::UnboundRole {
                task: node.id.clone(),
                role: node.assigned_role.clone(),
            }),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Turn outcomes
// ============================================================================

/// The agent finished its part of the work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub output: String,
    /// Remediation knowledge the agent would like persisted. Stored only once
    /// a human has approved it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_record: Option<MemoryRecord>,
}

/// The agent transfers control to a peer by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRequest {
    pub target: AgentName,
    pub message: String,
    /// Record the handoff but end the run with `message` as the output.
    #[serde(default)]
    pub terminate: bool,
}

/// The agent needs a human decision before it can continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanInputRequest {
    pub message: String,
}

/// Result of a single agent invocation.
///
/// Exactly one variant per turn; the orchestrator never guesses intent from
/// free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentTurn {
    Completion(Completion),
    Handoff(HandoffRequest),
    HumanInputRequest(HumanInputRequest),
}

impl AgentTurn {
    pub fn complete(output: impl Into<String>) -> Self {
        AgentTurn::Completion(Completion {
            output: output.into(),
            proposed_record: None,
        })
    }

    pub fn handoff(target: AgentName, message: impl Into<String>) -> Self {
        AgentTurn::Handoff(HandoffRequest {
            target,
            message: message.into(),
            terminate: false,
        })
    }

    pub fn ask_human(message: impl Into<String>) -> Self {
        AgentTurn::HumanInputRequest(HumanInputRequest {
            message: message.into(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AgentTurn::Completion(_) => "completion",
            AgentTurn::Handoff(_) => "handoff",
            AgentTurn::HumanInputRequest(_) => "human_input_request",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::presets;

    fn agent(name: &str) -> AgentIdentity {
        AgentIdentity::new(AgentName::new(name).unwrap(), format!("You are {name}"))
    }

    #[test]
    fn test_agent_name_rejects_blank() {
        assert_eq!(AgentName::new("  "), Err(RosterError::EmptyName));
        assert!(AgentName::new("gatherer").is_ok());
    }

    #[test]
    fn test_roster_rejects_duplicates_and_empty() {
        assert_eq!(Roster::new(vec![]), Err(RosterError::EmptyRoster));

        let err = Roster::new(vec![agent("a"), agent("b"), agent("a")]).unwrap_err();
        assert_eq!(err, RosterError::DuplicateAgent(AgentName::new("a").unwrap()));
    }

    #[test]
    fn test_roster_entry_is_first_agent() {
        let roster = Roster::new(vec![agent("gatherer"), agent("critic")]).unwrap();
        assert_eq!(roster.entry().name.as_str(), "gatherer");
        assert!(roster.contains(&AgentName::new("critic").unwrap()));
        assert!(!roster.contains(&AgentName::new("curator").unwrap()));
    }

    #[test]
    fn test_blank_names_rejected_when_deserialized() {
        assert!(serde_yaml::from_str::<AgentName>("\"  \"").is_err());
        assert!(serde_yaml::from_str::<Roster>("- name: \"\"\n  role_prompt: x\n").is_err());
        assert!(serde_yaml::from_str::<AgentTurn>("kind: handoff\ntarget: \" \"\nmessage: hi\n").is_err());
        assert_eq!(
            serde_yaml::from_str::<AgentName>("critic").unwrap(),
            AgentName::new("critic").unwrap()
        );
    }

    #[test]
    fn test_bindings_check_reports_unbound_role() {
        let graph = presets::vulnerability_management_graph().unwrap();
        let partial = RoleBindings::new().bind(presets::GATHERER, agent(presets::GATHERER));

        // nodes are checked in id order: critique_remediation comes first
        assert_eq!(
            partial.check(&graph),
            Err(ValidationError::UnboundRole {
                task: crate::domain::task_graph::TaskId::new(presets::CRITIQUE_TASK).unwrap(),
                role: presets::CRITIC.to_string(),
            })
        );
        assert!(presets::vulnerability_bindings().unwrap().check(&graph).is_ok());
    }

    #[test]
    fn test_roster_deserialization_validates() {
        let yaml = "- name: a\n  role_prompt: x\n- name: a\n  role_prompt: y\n";
        assert!(serde_yaml::from_str::<Roster>(yaml).is_err());
    }

    #[test]
    fn test_turn_yaml_tagging() {
        let turn: AgentTurn =
            serde_yaml::from_str("kind: handoff\ntarget: critic\nmessage: review this\n").unwrap();
        match turn {
            AgentTurn::Handoff(h) => {
                assert_eq!(h.target.as_str(), "critic");
                assert!(!h.terminate);
            }
            other => panic!("unexpected turn {other:?}"),
        }
        assert_eq!(AgentTurn::ask_human("ok?").kind(), "human_input_request");
    }
}
