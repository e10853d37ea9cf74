// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory remediation knowledge, partitioned by actor namespace.
//!
//! Handles returned by [`InMemoryKnowledgeStore::for_actor`] share the same
//! backing map, so a record written through one actor's handle is visible
//! only to handles of that actor.

use crate::domain::knowledge::{
    actor_namespace, ApprovalStatus, HumanApproval, KnowledgeError, KnowledgeStore, MemoryRecord,
    VulnerabilitySignature,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

type Namespaces = HashMap<String, Vec<MemoryRecord>>;

#[derive(Clone)]
pub struct InMemoryKnowledgeStore {
    namespace: String,
    records: Arc<RwLock<Namespaces>>,
}

impl InMemoryKnowledgeStore {
    pub fn new(actor_id: &str) -> Self {
        Self {
            namespace: actor_namespace(actor_id),
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Handle on the same backing store scoped to another actor.
    pub fn for_actor(&self, actor_id: &str) -> Self {
        Self {
            namespace: actor_namespace(actor_id),
            records: self.records.clone(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn len(&self) -> usize {
        self.records
            .read()
            .await
            .get(&self.namespace)
            .map_or(0, Vec::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn query(
        &self,
        signature: &VulnerabilitySignature,
    ) -> Result<Vec<MemoryRecord>, KnowledgeError> {
        let records = self.records.read().await;
        let found: Vec<MemoryRecord> = records
            .get(&self.namespace)
            .map(|all| {
                all.iter()
                    .filter(|r| &r.vulnerability_signature == signature)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        debug!(namespace = %self.namespace, signature = %signature, hits = found.len(), "Knowledge query");
        Ok(found)
    }

    async fn store(
        &self,
        mut record: MemoryRecord,
        approval: &HumanApproval,
    ) -> Result<(), KnowledgeError> {
        if !approval.approved {
            warn!(signature = %record.vulnerability_signature, "Rejected unapproved knowledge write");
            return Err(KnowledgeError::ApprovalRequired(record.vulnerability_signature));
        }

        record.approval_status = ApprovalStatus::Approved;
        record.approved_by = approval.approved_by.clone();
        record.recorded_at = Some(Utc::now());

        info!(namespace = %self.namespace, signature = %record.vulnerability_signature, "Stored remediation record");
        self.records
            .write()
            .await
            .entry(self.namespace.clone())
            .or_default()
            .push(record);
        Ok(())
    }
}
