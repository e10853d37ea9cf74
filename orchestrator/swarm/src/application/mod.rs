// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Swarm Controller Application Service
//!
//! Runs a roster of peers that pass control to one another by name until one
//! of them completes, a human is needed, or a bound trips.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Bounded handoff loop, suspension and resumption
//!
//! # Loop
//!
//! ```text
//! loop {
//!     cancelled?                 -> abort Cancelled
//!     execution budget spent?    -> abort ExecutionTimeout
//!     iteration_count == max?    -> abort IterationLimitExceeded
//!     turn = invoke(current_agent, pending_message)
//!     Completion        -> complete
//!     Handoff           -> limit check, append, repetition check, switch agent
//!     HumanInputRequest -> suspend (same agent receives the answer)
//!     error / timeout   -> complete with last output, or abort NoUsableOutput
//! }
//! ```

use crate::domain::{detect_repetition, SwarmRunState, SwarmStatus};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vulnagent_core::domain::agent::{AgentName, AgentTurn, Roster};
use vulnagent_core::domain::checkpoint::HumanResponse;
use vulnagent_core::domain::config::SwarmBounds;
use vulnagent_core::domain::events::SwarmEvent;
use vulnagent_core::domain::invoker::{
    invoke_with_deadline, AgentInvoker, ContextMessage, InvocationContext, InvocationError,
    NodeFailure,
};
use vulnagent_core::domain::knowledge::{HumanApproval, KnowledgeStore, MemoryRecord, VulnerabilitySignature};
use vulnagent_core::domain::result::{
    AbortReason, PhaseDiagnostics, PhaseKind, PhaseResult, PhaseStatus, RunId,
};
use vulnagent_core::domain::validation::ValidationError;
use vulnagent_core::infrastructure::event_bus::EventBus;

const APPROVER: &str = "human-checkpoint";

/// Input of a swarm run.
#[derive(Debug, Clone)]
pub struct SwarmRequest {
    pub roster: Roster,
    /// Defaults to the first roster member.
    pub entry_agent: Option<AgentName>,
    pub initial_message: String,
    /// Used to look up prior remediation knowledge.
    pub signature: Option<VulnerabilitySignature>,
}

#[derive(Debug, Clone)]
pub enum SwarmOutcome {
    Completed {
        state: SwarmRunState,
        output: String,
    },
    AwaitingInput {
        state: SwarmRunState,
        requested_by: AgentName,
        message: String,
    },
    Aborted {
        state: SwarmRunState,
        reason: AbortReason,
    },
}

impl SwarmOutcome {
    pub fn state(&self) -> &SwarmRunState {
        match self {
            SwarmOutcome::Completed { state, .. }
            | SwarmOutcome::AwaitingInput { state, .. }
            | SwarmOutcome::Aborted { state, .. } => state,
        }
    }

    pub fn into_state(self) -> SwarmRunState {
        match self {
            SwarmOutcome::Completed { state, .. }
            | SwarmOutcome::AwaitingInput { state, .. }
            | SwarmOutcome::Aborted { state, .. } => state,
        }
    }

    /// An aborted swarm keeps its last handoff message or completion as
    /// partial output.
    pub fn phase_result(&self, name: &str, required: bool) -> PhaseResult {
        let state = self.state();
        let (status, output) = match self {
            SwarmOutcome::Completed { output, .. } => (PhaseStatus::Completed, Some(output.clone())),
            SwarmOutcome::AwaitingInput { .. } => (PhaseStatus::Suspended, None),
            SwarmOutcome::Aborted { reason, .. } => (
                PhaseStatus::Aborted {
                    reason: reason.clone(),
                },
                state.last_output.clone(),
            ),
        };
        PhaseResult {
            name: name.to_string(),
            kind: PhaseKind::Swarm,
            required,
            status,
            output,
            diagnostics: PhaseDiagnostics::Swarm {
                handoffs: state.handoff_log.events().to_vec(),
                iterations: state.iteration_count,
                elapsed: state.elapsed,
                failures: state.failures.clone(),
                stored_records: state.stored_records.clone(),
                unapproved_records: state.unapproved_records.clone(),
            },
        }
    }
}

pub struct SwarmController {
    invoker: Arc<dyn AgentInvoker>,
    bounds: SwarmBounds,
    knowledge: Option<Arc<dyn KnowledgeStore>>,
    event_bus: Option<EventBus>,
}

impl SwarmController {
    pub fn new(invoker: Arc<dyn AgentInvoker>, bounds: SwarmBounds) -> Result<Self, ValidationError> {
        bounds.validate()?;
        Ok(Self {
            invoker,
            bounds,
            knowledge: None,
            event_bus: None,
        })
    }

    pub fn with_knowledge(mut self, store: Arc<dyn KnowledgeStore>) -> Self {
        self.knowledge = Some(store);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn bounds(&self) -> &SwarmBounds {
        &self.bounds
    }

    pub async fn run(
        &self,
        run_id: RunId,
        request: SwarmRequest,
        cancel: &CancellationToken,
    ) -> Result<SwarmOutcome, ValidationError> {
        let entry = match request.entry_agent {
            Some(name) if !request.roster.contains(&name) => {
                return Err(ValidationError::UnknownEntryAgent(name))
            }
            Some(name) => name,
            None => request.roster.entry().name.clone(),
        };

        let mut state = SwarmRunState::new(request.roster, entry, request.initial_message);
        if let Some(signature) = request.signature {
            state.prior_records = self.prior_records(&signature).await;
            state.signature = Some(signature);
        }

        info!(
            run_id = %run_id,
            swarm_id = %state.id,
            entry = %state.current_agent,
            agents = state.roster.len(),
            "Starting swarm"
        );
        Ok(self.drive(run_id, state, cancel).await)
    }

    /// Continue a suspended swarm. The human's answer becomes the next
    /// message to the agent that asked.
    pub async fn resume(
        &self,
        run_id: RunId,
        mut state: SwarmRunState,
        response: HumanResponse,
        cancel: &CancellationToken,
    ) -> SwarmOutcome {
        if state.status != SwarmStatus::Suspended {
            warn!(run_id = %run_id, status = ?state.status, "Resuming a swarm that was not suspended");
        }
        if response.is_approval() {
            state.human_approved = true;
        }
        state.pending_message = response.as_str().to_string();
        state.human_response = Some(response.as_str().to_string());

        info!(run_id = %run_id, agent = %state.current_agent, "Resuming swarm");
        self.drive(run_id, state, cancel).await
    }

    async fn prior_records(&self, signature: &VulnerabilitySignature) -> Vec<MemoryRecord> {
        let Some(store) = &self.knowledge else {
            return Vec::new();
        };
        match store.query(signature).await {
            Ok(records) => {
                debug!(signature = %signature, records = records.len(), "Loaded prior remediation knowledge");
                records
            }
            Err(e) => {
                warn!(signature = %signature, error = %e, "Knowledge lookup failed; continuing without it");
                Vec::new()
            }
        }
    }

    async fn drive(
        &self,
        run_id: RunId,
        mut state: SwarmRunState,
        cancel: &CancellationToken,
    ) -> SwarmOutcome {
        let started = Instant::now();
        let budget = self.bounds.execution_timeout;
        let deadline = started + budget.saturating_sub(state.elapsed);
        let run_token = cancel.child_token();
        state.status = SwarmStatus::Running;

        loop {
            if cancel.is_cancelled() {
                return self.abort(run_id, state, started, AbortReason::Cancelled);
            }
            if Instant::now() >= deadline {
                return self.abort(run_id, state, started, AbortReason::ExecutionTimeout { budget });
            }
            if state.iteration_count >= self.bounds.max_iterations {
                let limit = self.bounds.max_iterations;
                return self.abort(run_id, state, started, AbortReason::IterationLimitExceeded { limit });
            }
            state.iteration_count += 1;

            let Some(agent) = state.roster.get(&state.current_agent).cloned() else {
                let err = InvocationError::Failed {
                    agent: state.current_agent.clone(),
                    reason: "agent is not in the roster".into(),
                };
                state.failures.push(NodeFailure::new(state.current_agent.clone(), None, &err));
                return self.finish_without_handoff(run_id, state, started);
            };

            let context = self.context_for(run_id, &state);
            let input = std::mem::take(&mut state.pending_message);
            debug!(run_id = %run_id, agent = %agent.name, iteration = state.iteration_count, "Invoking agent");
            if let Some(bus) = &self.event_bus {
                bus.publish_swarm_event(SwarmEvent::AgentInvoked {
                    run_id,
                    agent: agent.name.clone(),
                    iteration: state.iteration_count,
                    invoked_at: Utc::now(),
                });
            }

            let call = invoke_with_deadline(
                self.invoker.as_ref(),
                &agent,
                &input,
                &context,
                self.bounds.node_timeout,
                &run_token,
            );
            let result = match tokio::time::timeout_at(deadline, call).await {
                Ok(result) => result,
                Err(_) => {
                    run_token.cancel();
                    return self.abort(run_id, state, started, AbortReason::ExecutionTimeout { budget });
                }
            };
            state.human_response = None;

            match result {
                Ok(AgentTurn::Completion(completion)) => {
                    state.last_output = Some(completion.output.clone());
                    if let Some(record) = completion.proposed_record {
                        self.file_record(&mut state, record).await;
                    }
                    return self.complete(run_id, state, started, completion.output);
                }
                Ok(AgentTurn::Handoff(handoff)) => {
                    if !state.roster.contains(&handoff.target) {
                        let err = InvocationError::UnknownTarget {
                            agent: agent.name.clone(),
                            target: handoff.target.clone(),
                        };
                        warn!(run_id = %run_id, error = %err, "Ignoring handoff to unknown agent");
                        state.failures.push(NodeFailure::new(agent.name, None, &err));
                        return self.finish_without_handoff(run_id, state, started);
                    }
                    if state.handoff_log.len() >= self.bounds.max_handoffs as usize {
                        let limit = self.bounds.max_handoffs;
                        return self.abort(run_id, state, started, AbortReason::HandoffLimitExceeded { limit });
                    }

                    let event = state
                        .handoff_log
                        .append(agent.name.clone(), handoff.target.clone(), handoff.message.clone())
                        .clone();
                    metrics::counter!("vulnagent_swarm_handoffs_total").increment(1);
                    info!(
                        run_id = %run_id,
                        sequence = event.sequence,
                        from = %event.from_agent,
                        to = %event.to_agent,
                        "Handoff"
                    );
                    if let Some(bus) = &self.event_bus {
                        bus.publish_swarm_event(SwarmEvent::HandoffRecorded { run_id, handoff: event });
                    }
                    state.last_output = Some(handoff.message.clone());

                    if let Some(reason) = detect_repetition(
                        &state.handoff_log,
                        self.bounds.repetitive_handoff_detection_window,
                        self.bounds.repetitive_handoff_min_unique_agents,
                    ) {
                        return self.abort(run_id, state, started, reason);
                    }
                    if handoff.terminate {
                        return self.complete(run_id, state, started, handoff.message);
                    }
                    state.current_agent = handoff.target;
                    state.pending_message = handoff.message;
                }
                Ok(AgentTurn::HumanInputRequest(request)) => {
                    state.status = SwarmStatus::Suspended;
                    state.elapsed += started.elapsed();
                    metrics::counter!("vulnagent_swarm_suspensions_total").increment(1);
                    info!(run_id = %run_id, agent = %agent.name, "Swarm awaiting human input");
                    return SwarmOutcome::AwaitingInput {
                        state,
                        requested_by: agent.name,
                        message: request.message,
                    };
                }
                Err(InvocationError::Cancelled { .. }) if cancel.is_cancelled() => {
                    return self.abort(run_id, state, started, AbortReason::Cancelled);
                }
                Err(e) => {
                    warn!(run_id = %run_id, agent = %agent.name, error = %e, "Agent produced no turn");
                    state.failures.push(NodeFailure::new(agent.name, None, &e));
                    return self.finish_without_handoff(run_id, state, started);
                }
            }
        }
    }

    fn context_for(&self, run_id: RunId, state: &SwarmRunState) -> InvocationContext {
        let mut context = InvocationContext::for_run(run_id);
        context.history = state
            .handoff_log
            .events()
            .iter()
            .map(|e| ContextMessage {
                author: e.from_agent.to_string(),
                content: e.message.clone(),
            })
            .collect();
        context.prior_records = state.prior_records.clone();
        context.human_response = state.human_response.clone();
        context
    }

    /// Persist a proposed record only when a human approved during this run.
    async fn file_record(&self, state: &mut SwarmRunState, record: MemoryRecord) {
        let store = match (&self.knowledge, state.human_approved) {
            (Some(store), true) => store,
            _ => {
                debug!(signature = %record.vulnerability_signature, "Holding unapproved knowledge proposal");
                state.unapproved_records.push(record);
                return;
            }
        };
        match store.store(record.clone(), &HumanApproval::granted(APPROVER)).await {
            Ok(()) => state.stored_records.push(record),
            Err(e) => {
                warn!(error = %e, "Failed to store approved remediation record");
                state.unapproved_records.push(record);
            }
        }
    }

    /// No handoff was produced: the run ends with whatever output it has.
    fn finish_without_handoff(&self, run_id: RunId, state: SwarmRunState, started: Instant) -> SwarmOutcome {
        match state.last_output.clone() {
            Some(output) => self.complete(run_id, state, started, output),
            None => self.abort(run_id, state, started, AbortReason::NoUsableOutput),
        }
    }

    fn complete(&self, run_id: RunId, mut state: SwarmRunState, started: Instant, output: String) -> SwarmOutcome {
        state.status = SwarmStatus::Completed;
        state.elapsed += started.elapsed();
        metrics::counter!("vulnagent_swarm_completed_total").increment(1);
        info!(
            run_id = %run_id,
            handoffs = state.handoff_log.len(),
            iterations = state.iteration_count,
            "Swarm completed"
        );
        SwarmOutcome::Completed { state, output }
    }

    fn abort(&self, run_id: RunId, mut state: SwarmRunState, started: Instant, reason: AbortReason) -> SwarmOutcome {
        state.status = SwarmStatus::Aborted {
            reason: reason.clone(),
        };
        state.elapsed += started.elapsed();
        metrics::counter!("vulnagent_swarm_aborts_total", "reason" => reason.code()).increment(1);
        warn!(
            run_id = %run_id,
            reason = %reason,
            handoffs = state.handoff_log.len(),
            iterations = state.iteration_count,
            "Swarm aborted"
        );
        SwarmOutcome::Aborted { state, reason }
    }
}
