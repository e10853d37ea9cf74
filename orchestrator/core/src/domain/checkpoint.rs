// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Human Checkpoints
//!
//! A [`HumanCheckpoint`] is created when an agent asks for a human decision.
//! The run is suspended and can only be continued by presenting the
//! checkpoint's [`ResumptionToken`] together with the human's answer.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Checkpoint value objects, resumption tokens, human responses

use crate::domain::agent::AgentName;
use crate::domain::task_graph::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque single-use token identifying a suspended run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumptionToken(String);

impl ResumptionToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResumptionToken {
    fn from(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }
}

impl fmt::Display for ResumptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanCheckpoint {
    pub conversation_id: ConversationId,
    pub pending_message: String,
    pub resumption_token: ResumptionToken,
    pub requested_by: AgentName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
}

/// Free-text answer supplied by a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HumanResponse(String);

impl HumanResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the answer signs off on the proposal it responds to.
    ///
    /// Accepts `approve`, `approved`, `yes` and `y`, ignoring case and
    /// surrounding whitespace or a trailing period.
    pub fn is_approval(&self) -> bool {
        let normalized = self.0.trim().trim_end_matches('.').to_ascii_lowercase();
        matches!(normalized.as_str(), "approve" | "approved" | "yes" | "y")
    }
}

impl From<&str> for HumanResponse {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for HumanResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    #[error("resumption token '{0}' is unknown, already used or expired")]
    InvalidResumption(ResumptionToken),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(ResumptionToken::generate(), ResumptionToken::generate());
    }

    #[test]
    fn test_approval_detection() {
        for yes in ["approved", " Yes ", "y", "APPROVE."] {
            assert!(HumanResponse::from(yes).is_approval(), "{yes}");
        }
        for no in ["rejected", "no", "approved but patch staging first", ""] {
            assert!(!HumanResponse::from(no).is_approval(), "{no}");
        }
    }
}
