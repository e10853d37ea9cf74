// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Remediation Knowledge
//!
//! Value objects and the storage port for remediation knowledge that survives
//! across runs. Agents may read prior records freely. Writes require an
//! explicit human approval, enforced at the port.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Knowledge records and the `KnowledgeStore` interface
//!
//! Records are partitioned per actor under `/vuln/remediation/{actor_id}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifies a vulnerability across runs, e.g. `CVE-2024-3094:xz-utils`.
///
/// Comparison is case-insensitive; the signature is stored trimmed and
/// lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct VulnerabilitySignature(String);

impl VulnerabilitySignature {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VulnerabilitySignature {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<VulnerabilitySignature> for String {
    fn from(sig: VulnerabilitySignature) -> Self {
        sig.0
    }
}

impl fmt::Display for VulnerabilitySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// How a remediation fared when applied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutcomeMetrics {
    #[serde(default)]
    pub applications: u32,
    #[serde(default)]
    pub successes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_time_to_remediate_secs: Option<u64>,
}

impl OutcomeMetrics {
    pub fn success_rate(&self) -> Option<f64> {
        (self.applications > 0).then(|| f64::from(self.successes) / f64::from(self.applications))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub vulnerability_signature: VulnerabilitySignature,
    pub remediation_steps: Vec<String>,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    #[serde(default)]
    pub outcome_metrics: OutcomeMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    pub fn new(signature: VulnerabilitySignature, remediation_steps: Vec<String>) -> Self {
        Self {
            vulnerability_signature: signature,
            remediation_steps,
            approval_status: ApprovalStatus::Pending,
            outcome_metrics: OutcomeMetrics::default(),
            approved_by: None,
            recorded_at: None,
        }
    }
}

/// Human sign-off attached to a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanApproval {
    pub approved: bool,
    pub approved_by: Option<String>,
}

impl HumanApproval {
    pub fn granted(by: impl Into<String>) -> Self {
        Self {
            approved: true,
            approved_by: Some(by.into()),
        }
    }

    pub fn denied() -> Self {
        Self {
            approved: false,
            approved_by: None,
        }
    }
}

/// Storage namespace for one actor's records.
pub fn actor_namespace(actor_id: &str) -> String {
    format!("/vuln/remediation/{actor_id}")
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("refusing to store record for '{0}' without human approval")]
    ApprovalRequired(VulnerabilitySignature),

    #[error("knowledge backend unavailable: {0}")]
    Backend(String),
}

/// Persistent remediation knowledge.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Records previously stored for `signature`, oldest first.
    async fn query(
        &self,
        signature: &VulnerabilitySignature,
    ) -> Result<Vec<MemoryRecord>, KnowledgeError>;

    /// Persist `record`. Fails with [`KnowledgeError::ApprovalRequired`]
    /// unless `approval.approved` is set.
    async fn store(
        &self,
        record: MemoryRecord,
        approval: &HumanApproval,
    ) -> Result<(), KnowledgeError>;
}
