// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Handoff events: one record per control transfer between agents.

use crate::domain::agent::AgentName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of a control transfer in a swarm run.
///
/// `sequence` is assigned by the handoff log and is strictly increasing
/// within a run, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffEvent {
    pub sequence: u64,
    pub from_agent: AgentName,
    pub to_agent: AgentName,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
