// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Invoker Port
//!
//! The single seam between orchestration logic and whatever actually runs an
//! agent (a hosted model, a local process, a scripted test double).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** `AgentInvoker` trait, invocation context, per-node deadlines
//!
//! Both the task-graph runner and the swarm controller dispatch through
//! [`invoke_with_deadline`], which bounds a call by the node timeout and the
//! run's cancellation token. Implementations must stop work promptly once the
//! token passed to [`AgentInvoker::invoke`] is cancelled.

use crate::domain::agent::{AgentIdentity, AgentName, AgentTurn};
use crate::domain::knowledge::MemoryRecord;
use crate::domain::result::RunId;
use crate::domain::task_graph::TaskId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A prior message made visible to the invoked agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    /// Agent name or task id that produced the content.
    pub author: String,
    pub content: String,
}

/// Everything an agent may see besides its direct input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationContext {
    pub run_id: Option<RunId>,
    /// Set when dispatched for a task graph node.
    pub task_id: Option<TaskId>,
    /// Dependency outputs (graph mode) or handoff history (swarm mode).
    pub history: Vec<ContextMessage>,
    /// Knowledge retrieved for the vulnerability under analysis.
    pub prior_records: Vec<MemoryRecord>,
    /// Present on the first dispatch after a human checkpoint resolved.
    pub human_response: Option<String>,
}

impl InvocationContext {
    pub fn for_run(run_id: RunId) -> Self {
        Self {
            run_id: Some(run_id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("agent '{agent}' did not respond within {after:?}")]
    TimedOut { agent: AgentName, after: Duration },

    #[error("invocation of agent '{agent}' was cancelled")]
    Cancelled { agent: AgentName },

    #[error("agent '{agent}' failed: {reason}")]
    Failed { agent: AgentName, reason: String },

    #[error("agent '{agent}' handed off to '{target}', which is not in the roster")]
    UnknownTarget { agent: AgentName, target: AgentName },
}

/// Runs one agent turn.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(
        &self,
        agent: &AgentIdentity,
        input: &str,
        context: &InvocationContext,
        cancel: CancellationToken,
    ) -> Result<AgentTurn, InvocationError>;
}

/// Diagnostic entry for an invocation that did not produce a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub agent: AgentName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl NodeFailure {
    pub fn new(agent: AgentName, task_id: Option<TaskId>, error: &InvocationError) -> Self {
        Self {
            agent,
            task_id,
            error: error.to_string(),
            failed_at: Utc::now(),
        }
    }
}

/// Invoke `agent`, giving up after `node_timeout` or when `cancel` fires.
///
/// The invoker receives a child of `cancel`; it is cancelled as well when the
/// node deadline passes so background work started by the invoker winds down.
pub async fn invoke_with_deadline(
    invoker: &dyn AgentInvoker,
    agent: &AgentIdentity,
    input: &str,
    context: &InvocationContext,
    node_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<AgentTurn, InvocationError> {
    let call_token = cancel.child_token();
    let call = invoker.invoke(agent, input, context, call_token.clone());

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(InvocationError::Cancelled {
            agent: agent.name.clone(),
        }),
        res = tokio::time::timeout(node_timeout, call) => match res {
            Ok(turn) => turn,
            Err(_) => Err(InvocationError::TimedOut {
                agent: agent.name.clone(),
                after: node_timeout,
            }),
        },
    };

    if outcome.is_err() {
        call_token.cancel();
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowInvoker {
        delay: Duration,
    }

    #[async_trait]
    impl AgentInvoker for SlowInvoker {
        async fn invoke(
            &self,
            _agent: &AgentIdentity,
            input: &str,
            _context: &InvocationContext,
            cancel: CancellationToken,
        ) -> Result<AgentTurn, InvocationError> {
            tokio::select! {
                _ = cancel.cancelled() => Err(InvocationError::Failed {
                    agent: AgentName::new("slow").unwrap(),
                    reason: "cancelled".into(),
                }),
                _ = tokio::time::sleep(self.delay) => Ok(AgentTurn::complete(input.to_uppercase())),
            }
        }
    }

    fn agent() -> AgentIdentity {
        AgentIdentity::new(AgentName::new("slow").unwrap(), "prompt")
    }

    #[tokio::test]
    async fn test_invoke_within_deadline() {
        let invoker = SlowInvoker { delay: Duration::from_millis(5) };
        let token = CancellationToken::new();
        let turn = invoke_with_deadline(
            &invoker,
            &agent(),
            "scan",
            &InvocationContext::default(),
            Duration::from_secs(1),
            &token,
        )
        .await
        .unwrap();
        assert_eq!(turn, AgentTurn::complete("SCAN"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_times_out() {
        let invoker = SlowInvoker { delay: Duration::from_secs(60) };
        let token = CancellationToken::new();
        let err = invoke_with_deadline(
            &invoker,
            &agent(),
            "scan",
            &InvocationContext::default(),
            Duration::from_secs(2),
            &token,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InvocationError::TimedOut { after, .. } if after == Duration::from_secs(2)));
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_invoke_cancelled() {
        let invoker = SlowInvoker { delay: Duration::from_secs(60) };
        let token = CancellationToken::new();
        token.cancel();
        let err = invoke_with_deadline(
            &invoker,
            &agent(),
            "scan",
            &InvocationContext::default(),
            Duration::from_secs(120),
            &token,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InvocationError::Cancelled { .. }));
    }
}
