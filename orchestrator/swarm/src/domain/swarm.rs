// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Aggregates
//!
//! Defines the state of a free-handoff swarm run:
//!
//! - [`SwarmId`] — unique identifier (UUID newtype).
//! - [`HandoffLog`] — append-only record of control transfers.
//! - [`SwarmRunState`] — aggregate root; everything needed to continue a run
//!   after a human checkpoint.
//! - [`detect_repetition`] — ping-pong guard over the most recent handoffs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;
use vulnagent_core::domain::agent::{AgentName, Roster};
use vulnagent_core::domain::handoff::HandoffEvent;
use vulnagent_core::domain::invoker::NodeFailure;
use vulnagent_core::domain::knowledge::{MemoryRecord, VulnerabilitySignature};
use vulnagent_core::domain::result::AbortReason;

/// Unique identifier for a swarm run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwarmId(pub Uuid);

impl SwarmId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SwarmId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Append-only handoff history. Sequence numbers start at 1 and increase by
/// one per event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffLog {
    events: Vec<HandoffEvent>,
}

impl HandoffLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, from: AgentName, to: AgentName, message: impl Into<String>) -> &HandoffEvent {
        let sequence = self.events.last().map_or(1, |e| e.sequence + 1);
        self.events.push(HandoffEvent {
            sequence,
            from_agent: from,
            to_agent: to,
            message: message.into(),
            timestamp: Utc::now(),
        });
        &self.events[self.events.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[HandoffEvent] {
        &self.events
    }

    /// The last `n` events, oldest first.
    pub fn recent(&self, n: usize) -> &[HandoffEvent] {
        let start = self.events.len().saturating_sub(n);
        &self.events[start..]
    }
}

/// Check the last `window` handoffs for ping-pong between too few agents.
///
/// Runs only once the log holds at least `window` events. The window is
/// diverse enough when both the distinct `to_agent` count and the distinct
/// unordered `{from, to}` pair count reach `min_unique`; otherwise the run
/// must abort. A `window` of zero disables the check.
pub fn detect_repetition(log: &HandoffLog, window: usize, min_unique: usize) -> Option<AbortReason> {
    if window == 0 || log.len() < window {
        return None;
    }
    let recent = log.recent(window);

    let targets: BTreeSet<&AgentName> = recent.iter().map(|e| &e.to_agent).collect();
    let pairs: BTreeSet<(&AgentName, &AgentName)> = recent
        .iter()
        .map(|e| {
            if e.from_agent <= e.to_agent {
                (&e.from_agent, &e.to_agent)
            } else {
                (&e.to_agent, &e.from_agent)
            }
        })
        .collect();

    let unique = targets.len().min(pairs.len());
    (unique < min_unique).then_some(AbortReason::RepetitiveHandoffDetected {
        window,
        unique_agents: unique,
        required: min_unique,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SwarmStatus {
    /// Created, not yet dispatched.
    Idle,
    Running,
    Suspended,
    Completed,
    Aborted { reason: AbortReason },
}

/// Aggregate root of a swarm run.
///
/// # Invariants
///
/// - `handoff_log.len() <= max_handoffs` of the bounds it runs under.
/// - `current_agent` is always a roster member.
/// - `elapsed` counts only time spent running, never time suspended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmRunState {
    pub id: SwarmId,
    pub roster: Roster,
    pub handoff_log: HandoffLog,
    pub iteration_count: u32,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub status: SwarmStatus,
    /// Agent that receives `pending_message` on the next dispatch.
    pub current_agent: AgentName,
    pub pending_message: String,
    /// Latest handoff message or completion output.
    pub last_output: Option<String>,
    pub signature: Option<VulnerabilitySignature>,
    pub prior_records: Vec<MemoryRecord>,
    /// Set on the dispatch right after a human answered.
    pub human_response: Option<String>,
    pub human_approved: bool,
    pub failures: Vec<NodeFailure>,
    pub stored_records: Vec<MemoryRecord>,
    pub unapproved_records: Vec<MemoryRecord>,
}

impl SwarmRunState {
    pub fn new(roster: Roster, entry: AgentName, initial_message: impl Into<String>) -> Self {
        Self {
            id: SwarmId::new(),
            roster,
            handoff_log: HandoffLog::new(),
            iteration_count: 0,
            elapsed: Duration::ZERO,
            status: SwarmStatus::Idle,
            current_agent: entry,
            pending_message: initial_message.into(),
            last_output: None,
            signature: None,
            prior_records: Vec::new(),
            human_response: None,
            human_approved: false,
            failures: Vec::new(),
            stored_records: Vec::new(),
            unapproved_records: Vec::new(),
        }
    }

    pub fn with_signature(mut self, signature: VulnerabilitySignature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, SwarmStatus::Completed | SwarmStatus::Aborted { .. })
    }
}
