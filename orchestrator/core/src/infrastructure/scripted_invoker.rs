// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scripted Agent Invoker
//!
//! Replays pre-recorded turns per agent, in order. Used for dry runs from the
//! CLI and as the invoker double throughout the test suites. Every call is
//! recorded with its input and context so tests can assert on what an agent
//! was shown.
//!
//! # Script Format
//!
//! ```yaml
//! gatherer:
//!   - kind: completion
//!     output: "2 critical findings in openssl"
//! remediator:
//!   - kind: human_input_request
//!     message: "Reboot allowed during business hours?"
//!   - kind: handoff
//!     target: critic
//!     message: "Plan attached"
//!     delay: 2s
//! ```

use crate::domain::agent::{AgentIdentity, AgentName, AgentTurn};
use crate::domain::invoker::{AgentInvoker, InvocationContext, InvocationError};
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedStep {
    #[serde(flatten)]
    pub turn: AgentTurn,
    /// Simulated model latency.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub delay: Option<Duration>,
}

/// One observed invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub agent: AgentName,
    pub input: String,
    pub context: InvocationContext,
}

#[derive(Default)]
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<AgentName, VecDeque<ScriptedStep>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let scripts: BTreeMap<AgentName, Vec<ScriptedStep>> =
            serde_yaml::from_str(yaml).context("Invalid agent script")?;
        let invoker = Self::new();
        {
            let mut queues = invoker.scripts.lock();
            for (agent, steps) in scripts {
                queues.entry(agent).or_default().extend(steps);
            }
        }
        Ok(invoker)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read agent script {:?}", path))?;
        Self::from_yaml_str(&content)
    }

    /// Queue `turn` as the next reply of `agent`.
    pub fn push(&self, agent: AgentName, turn: AgentTurn) {
        self.push_step(agent, ScriptedStep { turn, delay: None });
    }

    pub fn push_delayed(&self, agent: AgentName, turn: AgentTurn, delay: Duration) {
        self.push_step(agent, ScriptedStep { turn, delay: Some(delay) });
    }

    fn push_step(&self, agent: AgentName, step: ScriptedStep) {
        self.scripts.lock().entry(agent).or_default().push_back(step);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Turns not yet consumed, per agent.
    pub fn remaining(&self) -> BTreeMap<AgentName, usize> {
        self.scripts
            .lock()
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(agent, q)| (agent.clone(), q.len()))
            .collect()
    }
}

#[async_trait]
impl AgentInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        agent: &AgentIdentity,
        input: &str,
        context: &InvocationContext,
        cancel: CancellationToken,
    ) -> Result<AgentTurn, InvocationError> {
        self.calls.lock().push(RecordedCall {
            agent: agent.name.clone(),
            input: input.to_string(),
            context: context.clone(),
        });

        let step = self
            .scripts
            .lock()
            .get_mut(&agent.name)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| InvocationError::Failed {
                agent: agent.name.clone(),
                reason: "no scripted turn left".into(),
            })?;
        debug!(agent = %agent.name, turn = step.turn.kind(), "Replaying scripted turn");

        match step.delay {
            Some(delay) => tokio::select! {
                _ = cancel.cancelled() => Err(InvocationError::Cancelled { agent: agent.name.clone() }),
                _ = tokio::time::sleep(delay) => Ok(step.turn),
            },
            None => Ok(step.turn),
        }
    }
}
