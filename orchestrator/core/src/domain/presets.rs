// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Vulnerability Management Presets
//!
//! The stock team: a gatherer that triages scanner findings, a remediator
//! that plans fixes, a critic that judges whether a plan is worth its effort,
//! and a curator that files approved remediations into long-term knowledge.
//!
//! | Task | Role | Priority | Depends on |
//! |------|------|----------|------------|
//! | `gather_vulnerabilities` | `gatherer` | 5 | |
//! | `plan_remediation` | `remediator` | 4 | `gather_vulnerabilities` |
//! | `critique_remediation` | `critic` | 3 | `plan_remediation` |

use crate::domain::agent::{AgentIdentity, AgentName, RoleBindings, Roster, RosterError};
use crate::domain::task_graph::{TaskGraph, TaskId, TaskNode};
use crate::domain::validation::ValidationError;

pub const WORKFLOW_ID: &str = "vulnerability_management";

pub const GATHERER: &str = "gatherer";
pub const REMEDIATOR: &str = "remediator";
pub const CRITIC: &str = "critic";
pub const CURATOR: &str = "curator";

pub const GATHER_TASK: &str = "gather_vulnerabilities";
pub const PLAN_TASK: &str = "plan_remediation";
pub const CRITIQUE_TASK: &str = "critique_remediation";

const GATHERER_PROMPT: &str = "\
You are VulnAgent, a vulnerability analysis specialist. Triage scanner findings \
(AWS Inspector and similar), rate each by severity, exploitability and business \
impact, and return a prioritized list with clear reasoning and suggested \
investigation steps. Prefer practical guidance over immediate fixes.";

const REMEDIATOR_PROMPT: &str = "\
You are VulnRemediator. Turn prioritized findings into urgency-ranked \
remediation plans: concrete steps or scripts, maintenance-window timing, \
rollback procedures and validation checks. Consult prior remediation records \
for this vulnerability before proposing a fix. Every plan must be reviewable \
by a human.";

const CRITIC_PROMPT: &str = "\
You are VulnCritic. Review remediation plans for completeness, root-cause \
coverage and adherence to security practice. Judge whether the effort is \
justified by the actual risk, name gaps or side effects, and give specific \
improvements. Send plans back to the remediator when they need another pass.";

const CURATOR_PROMPT: &str = "\
You are VulnCurator. Once a remediation has been approved by a human, \
summarize it as reusable knowledge: the vulnerability signature, the ordered \
remediation steps and any observed outcome. Never record unapproved plans.";

fn identity(name: &str, prompt: &str, tags: &[&str]) -> Result<AgentIdentity, RosterError> {
    Ok(AgentIdentity::new(AgentName::new(name)?, prompt).with_capabilities(tags.iter().copied()))
}

pub fn gatherer() -> Result<AgentIdentity, RosterError> {
    identity(GATHERER, GATHERER_PROMPT, &["triage", "scanner-findings"])
}

pub fn remediator() -> Result<AgentIdentity, RosterError> {
    identity(REMEDIATOR, REMEDIATOR_PROMPT, &["remediation", "knowledge-read"])
}

pub fn critic() -> Result<AgentIdentity, RosterError> {
    identity(CRITIC, CRITIC_PROMPT, &["review", "knowledge-read"])
}

pub fn curator() -> Result<AgentIdentity, RosterError> {
    identity(CURATOR, CURATOR_PROMPT, &["knowledge-write"])
}

/// Gatherer, remediator, critic and curator, with the gatherer as entry.
pub fn vulnerability_roster() -> Result<Roster, RosterError> {
    Roster::new(vec![gatherer()?, remediator()?, critic()?, curator()?])
}

/// Binds each graph role to the agent of the same name.
pub fn vulnerability_bindings() -> Result<RoleBindings, RosterError> {
    Ok(RoleBindings::new()
        .bind(GATHERER, gatherer()?)
        .bind(REMEDIATOR, remediator()?)
        .bind(CRITIC, critic()?))
}

/// gather → plan → critique.
pub fn vulnerability_management_graph() -> Result<TaskGraph, ValidationError> {
    let gather = TaskId::new(GATHER_TASK)?;
    let plan = TaskId::new(PLAN_TASK)?;
    let critique = TaskId::new(CRITIQUE_TASK)?;

    TaskGraph::new(vec![
        TaskNode::new(gather.clone(), "Gather and analyze vulnerability findings", GATHERER)
            .with_priority(5),
        TaskNode::new(plan.clone(), "Create urgency-based remediation plans", REMEDIATOR)
            .with_priority(4)
            .depends_on(gather),
        TaskNode::new(critique, "Validate remediation quality and worthiness", CRITIC)
            .with_priority(3)
            .depends_on(plan),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_graph_shape() {
        let graph = vulnerability_management_graph().unwrap();
        assert_eq!(graph.len(), 3);

        let plan = graph.get(&TaskId::new(PLAN_TASK).unwrap()).unwrap();
        assert_eq!(plan.priority, 4);
        assert!(plan.dependencies.contains(&TaskId::new(GATHER_TASK).unwrap()));

        let bindings = vulnerability_bindings().unwrap();
        for node in graph.nodes() {
            assert!(bindings.resolve(&node.assigned_role).is_some());
        }
    }

    #[test]
    fn test_preset_roster() {
        let roster = vulnerability_roster().unwrap();
        assert_eq!(roster.len(), 4);
        assert_eq!(roster.entry().name.as_str(), GATHERER);
        assert!(roster
            .get(&AgentName::new(CURATOR).unwrap())
            .unwrap()
            .has_capability("knowledge-write"));
    }
}
