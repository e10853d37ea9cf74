// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Human Checkpoint Gate - suspension and resumption of runs
//!
//! Holds the snapshot of every run that is waiting on a human, keyed by a
//! single-use resumption token. Nothing blocks while a run is suspended: the
//! caller gets a [`HumanCheckpoint`] back and later presents its token to
//! [`CheckpointGate::resume`].

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::agent::AgentName;
use crate::domain::checkpoint::{
    CheckpointError, ConversationId, HumanCheckpoint, HumanResponse, ResumptionToken,
};
use crate::domain::task_graph::TaskId;

struct Suspension<S> {
    checkpoint: HumanCheckpoint,
    snapshot: S,
    expires_at: Option<Instant>,
}

impl<S> Suspension<S> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Everything needed to continue a suspended run.
#[derive(Debug)]
pub struct Continuation<S> {
    pub checkpoint: HumanCheckpoint,
    pub snapshot: S,
    pub response: HumanResponse,
}

/// Who asked, and what they asked.
#[derive(Debug, Clone)]
pub struct InputRequest {
    pub conversation_id: ConversationId,
    pub requested_by: AgentName,
    pub task_id: Option<TaskId>,
    pub message: String,
}

pub struct CheckpointGate<S> {
    suspended: RwLock<HashMap<ResumptionToken, Suspension<S>>>,
    ttl: Option<Duration>,
}

impl<S: Send + Sync> CheckpointGate<S> {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            suspended: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Suspend a run and issue a fresh resumption token.
    pub async fn request_input(&self, request: InputRequest, snapshot: S) -> HumanCheckpoint {
        let checkpoint = HumanCheckpoint {
            conversation_id: request.conversation_id,
            pending_message: request.message,
            resumption_token: ResumptionToken::generate(),
            requested_by: request.requested_by,
            task_id: request.task_id,
            created_at: Utc::now(),
        };

        let suspension = Suspension {
            checkpoint: checkpoint.clone(),
            snapshot,
            expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
        };
        self.suspended
            .write()
            .await
            .insert(checkpoint.resumption_token.clone(), suspension);

        metrics::counter!("vulnagent_checkpoints_opened_total").increment(1);
        info!(
            conversation_id = %checkpoint.conversation_id,
            requested_by = %checkpoint.requested_by,
            "Run suspended awaiting human input"
        );
        checkpoint
    }

    /// Consume `token` and hand back the suspended snapshot with the human's
    /// answer. A token works once; unknown, reused and expired tokens leave
    /// the gate untouched.
    pub async fn resume(
        &self,
        token: &ResumptionToken,
        response: HumanResponse,
    ) -> Result<Continuation<S>, CheckpointError> {
        let mut suspended = self.suspended.write().await;

        let expired = suspended
            .get(token)
            .map(|s| !s.is_live(Instant::now()));
        match expired {
            None => {
                warn!(token = %token, "Resumption attempted with unknown token");
                return Err(CheckpointError::InvalidResumption(token.clone()));
            }
            Some(true) => {
                suspended.remove(token);
                warn!(token = %token, "Resumption attempted with expired token");
                return Err(CheckpointError::InvalidResumption(token.clone()));
            }
            Some(false) => {}
        }

        let suspension = suspended
            .remove(token)
            .ok_or_else(|| CheckpointError::InvalidResumption(token.clone()))?;

        info!(
            conversation_id = %suspension.checkpoint.conversation_id,
            "Resuming run with human response"
        );
        Ok(Continuation {
            checkpoint: suspension.checkpoint,
            snapshot: suspension.snapshot,
            response,
        })
    }

    /// Drop a suspended run without continuing it.
    pub async fn abandon(&self, token: &ResumptionToken) -> Result<(HumanCheckpoint, S), CheckpointError> {
        let suspension = self
            .suspended
            .write()
            .await
            .remove(token)
            .ok_or_else(|| CheckpointError::InvalidResumption(token.clone()))?;
        info!(conversation_id = %suspension.checkpoint.conversation_id, "Checkpoint abandoned");
        Ok((suspension.checkpoint, suspension.snapshot))
    }

    pub async fn get_pending(&self, token: &ResumptionToken) -> Option<HumanCheckpoint> {
        let now = Instant::now();
        self.suspended
            .read()
            .await
            .get(token)
            .filter(|s| s.is_live(now))
            .map(|s| s.checkpoint.clone())
    }

    /// Open checkpoints, oldest first. Expired ones are not listed.
    pub async fn list_pending(&self) -> Vec<HumanCheckpoint> {
        let now = Instant::now();
        let mut pending: Vec<HumanCheckpoint> = self
            .suspended
            .read()
            .await
            .values()
            .filter(|s| s.is_live(now))
            .map(|s| s.checkpoint.clone())
            .collect();
        pending.sort_by_key(|c| c.created_at);
        pending
    }

    /// Remove checkpoints past their TTL and return them.
    pub async fn purge_expired(&self) -> Vec<HumanCheckpoint> {
        let now = Instant::now();
        let mut suspended = self.suspended.write().await;
        let expired: Vec<ResumptionToken> = suspended
            .iter()
            .filter(|(_, s)| !s.is_live(now))
            .map(|(token, _)| token.clone())
            .collect();
        let purged: Vec<HumanCheckpoint> = expired
            .iter()
            .filter_map(|token| suspended.remove(token))
            .map(|s| s.checkpoint)
            .collect();
        if !purged.is_empty() {
            debug!(purged = purged.len(), "Purged expired checkpoints");
        }
        purged
    }
}
