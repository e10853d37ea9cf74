// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process orchestrator facade
//!
//! Wires the task graph runner, the handoff swarm, the checkpoint gate and
//! the result aggregator behind one entry point. Suspended runs are parked in
//! the gate; a resumption token brings them back exactly once.
//!
//! # Modes
//!
//! - `workflow`: the fixed task graph only
//! - `swarm`: the free handoff swarm only
//! - `pipeline`: task graph first, then a swarm seeded with its output

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vulnagent_core::application::aggregator::ResultAggregator;
use vulnagent_core::application::checkpoint_gate::{CheckpointGate, InputRequest};
use vulnagent_core::application::workflow_runner::{WorkflowOutcome, WorkflowRun, WorkflowRunner};
use vulnagent_core::domain::agent::{AgentName, RoleBindings, Roster};
use vulnagent_core::domain::checkpoint::{
    CheckpointError, ConversationId, HumanCheckpoint, HumanResponse, ResumptionToken,
};
use vulnagent_core::domain::config::OrchestratorSpec;
use vulnagent_core::domain::events::RunEvent;
use vulnagent_core::domain::invoker::AgentInvoker;
use vulnagent_core::domain::knowledge::{KnowledgeStore, VulnerabilitySignature};
use vulnagent_core::domain::presets;
use vulnagent_core::domain::result::{
    OrchestrationResult, OrchestrationStatus, PhaseDiagnostics, PhaseKind, PhaseResult, PhaseStatus,
    RunId, RunMode, RunRequest,
};
use vulnagent_core::domain::task_graph::{TaskGraph, TaskId};
use vulnagent_core::domain::validation::ValidationError;
use vulnagent_core::infrastructure::event_bus::{EventBus, EventReceiver};
use vulnagent_core::infrastructure::knowledge_store::InMemoryKnowledgeStore;
use vulnagent_core::infrastructure::workflow_parser::TaskGraphDefinition;
use vulnagent_swarm::{SwarmController, SwarmOutcome, SwarmRequest, SwarmRunState};

pub const TASK_GRAPH_PHASE: &str = "task_graph";
pub const SWARM_PHASE: &str = "swarm";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// A run parked at a human checkpoint.
#[derive(Debug, Clone)]
pub enum SuspendedRun {
    Workflow {
        run_id: RunId,
        mode: RunMode,
        run: WorkflowRun,
        /// Carried into the swarm phase of a pipeline.
        signature: Option<VulnerabilitySignature>,
    },
    Swarm {
        run_id: RunId,
        mode: RunMode,
        /// Phases finished before the swarm started.
        completed: Vec<PhaseResult>,
        state: SwarmRunState,
    },
}

impl SuspendedRun {
    pub fn run_id(&self) -> RunId {
        match self {
            SuspendedRun::Workflow { run_id, .. } | SuspendedRun::Swarm { run_id, .. } => *run_id,
        }
    }
}

struct Suspend {
    requested_by: AgentName,
    task_id: Option<TaskId>,
    message: String,
    snapshot: SuspendedRun,
}

pub struct Orchestrator {
    workflow: WorkflowRunner,
    swarm: SwarmController,
    gate: CheckpointGate<SuspendedRun>,
    event_bus: EventBus,
    graph: TaskGraph,
    bindings: RoleBindings,
    roster: Roster,
    active: Mutex<HashMap<RunId, CancellationToken>>,
    suspended: Mutex<HashMap<RunId, ResumptionToken>>,
}

impl Orchestrator {
    /// Build an orchestrator for the vulnerability management preset.
    pub fn new(invoker: Arc<dyn AgentInvoker>, spec: &OrchestratorSpec) -> Result<Self, OrchestratorError> {
        let event_bus = EventBus::with_default_capacity();
        let workflow = WorkflowRunner::new(invoker.clone(), spec.workflow.clone())?
            .with_event_bus(event_bus.clone());
        let mut swarm = SwarmController::new(invoker, spec.swarm.clone())?.with_event_bus(event_bus.clone());
        if spec.knowledge.enabled {
            let store: Arc<dyn KnowledgeStore> = Arc::new(InMemoryKnowledgeStore::new(&spec.knowledge.actor_id));
            swarm = swarm.with_knowledge(store);
        }

        let graph = presets::vulnerability_management_graph()?;
        let bindings = presets::vulnerability_bindings().map_err(ValidationError::from)?;
        bindings.check(&graph)?;

        Ok(Self {
            workflow,
            swarm,
            gate: CheckpointGate::new(spec.checkpoints.ttl),
            event_bus,
            graph,
            bindings,
            roster: presets::vulnerability_roster().map_err(ValidationError::from)?,
            active: Mutex::new(HashMap::new()),
            suspended: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the preset graph, bindings and roster with a parsed definition.
    pub fn with_definition(mut self, definition: TaskGraphDefinition) -> Self {
        self.graph = definition.graph;
        self.bindings = definition.bindings;
        self.roster = definition.roster;
        self
    }

    /// Use a separate knowledge store, e.g. one shared across orchestrators.
    pub fn with_knowledge(mut self, store: Arc<dyn KnowledgeStore>) -> Self {
        self.swarm = self.swarm.with_knowledge(store);
        self
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub async fn run(&self, request: RunRequest) -> Result<OrchestrationResult, OrchestratorError> {
        self.submit(request, None).await
    }

    pub async fn submit(
        &self,
        request: RunRequest,
        signature: Option<VulnerabilitySignature>,
    ) -> Result<OrchestrationResult, OrchestratorError> {
        match request.mode {
            RunMode::Workflow => self.submit_workflow(request.prompt).await,
            RunMode::Swarm => self.submit_swarm(request.prompt, signature).await,
            RunMode::Pipeline => self.run_pipeline(request.prompt, signature).await,
        }
    }

    pub async fn submit_workflow(&self, prompt: String) -> Result<OrchestrationResult, OrchestratorError> {
        self.start_graph(RunMode::Workflow, prompt, None).await
    }

    pub async fn submit_swarm(
        &self,
        prompt: String,
        signature: Option<VulnerabilitySignature>,
    ) -> Result<OrchestrationResult, OrchestratorError> {
        let run_id = RunId::new();
        self.started(run_id, RunMode::Swarm);
        let cancel = self.register(run_id);
        let outcome = self
            .swarm
            .run(run_id, self.swarm_request(prompt, signature), &cancel)
            .await;
        self.unregister(run_id);
        Ok(self.after_swarm(run_id, RunMode::Swarm, Vec::new(), outcome?).await)
    }

    /// Task graph, then a swarm seeded with the graph's output.
    pub async fn run_pipeline(
        &self,
        prompt: String,
        signature: Option<VulnerabilitySignature>,
    ) -> Result<OrchestrationResult, OrchestratorError> {
        self.start_graph(RunMode::Pipeline, prompt, signature).await
    }

    /// Continue a suspended run. Each token works once.
    pub async fn resume(
        &self,
        token: &ResumptionToken,
        response: HumanResponse,
    ) -> Result<OrchestrationResult, OrchestratorError> {
        self.reap_expired().await;
        let continuation = self.gate.resume(token, response).await?;
        let run_id = continuation.snapshot.run_id();
        self.suspended.lock().remove(&run_id);
        self.event_bus.publish_run_event(RunEvent::RunResumed {
            run_id,
            conversation_id: continuation.checkpoint.conversation_id,
            resumed_at: Utc::now(),
        });

        let cancel = self.register(run_id);
        let result = match continuation.snapshot {
            SuspendedRun::Workflow {
                run_id,
                mode,
                run,
                signature,
            } => {
                let outcome = self.workflow.resume(run, continuation.response, &cancel).await;
                self.after_graph(run_id, mode, outcome, signature, &cancel).await
            }
            SuspendedRun::Swarm {
                run_id,
                mode,
                completed,
                state,
            } => {
                let outcome = self
                    .swarm
                    .resume(run_id, state, continuation.response, &cancel)
                    .await;
                self.after_swarm(run_id, mode, completed, outcome).await
            }
        };
        self.unregister(run_id);
        Ok(result)
    }

    /// Cancel a running run or discard a suspended one. Returns whether the
    /// run was found.
    pub async fn abort(&self, run_id: RunId) -> bool {
        self.reap_expired().await;
        if let Some(cancel) = self.active.lock().get(&run_id) {
            info!(run_id = %run_id, "Cancelling run");
            cancel.cancel();
            return true;
        }

        let token = self.suspended.lock().remove(&run_id);
        match token {
            Some(token) => {
                if let Err(e) = self.gate.abandon(&token).await {
                    warn!(run_id = %run_id, error = %e, "Suspended run was already gone");
                    return false;
                }
                info!(run_id = %run_id, "Abandoned suspended run");
                self.event_bus.publish_run_event(RunEvent::RunFinished {
                    run_id,
                    status: OrchestrationStatus::Failed,
                    finished_at: Utc::now(),
                });
                true
            }
            None => false,
        }
    }

    pub async fn pending_checkpoints(&self) -> Vec<HumanCheckpoint> {
        self.reap_expired().await;
        self.gate.list_pending().await
    }

    /// Drop runs whose checkpoint outlived its TTL; they finish as failed.
    async fn reap_expired(&self) {
        let expired = self.gate.purge_expired().await;
        if expired.is_empty() {
            return;
        }
        let tokens: HashSet<&ResumptionToken> = expired.iter().map(|c| &c.resumption_token).collect();
        let mut dropped = Vec::new();
        self.suspended.lock().retain(|run_id, token| {
            let keep = !tokens.contains(token);
            if !keep {
                dropped.push(*run_id);
            }
            keep
        });

        for run_id in dropped {
            warn!(run_id = %run_id, "Checkpoint expired; abandoning suspended run");
            metrics::counter!("vulnagent_runs_finished_total", "status" => OrchestrationStatus::Failed.to_string())
                .increment(1);
            self.event_bus.publish_run_event(RunEvent::RunFinished {
                run_id,
                status: OrchestrationStatus::Failed,
                finished_at: Utc::now(),
            });
        }
    }

    async fn start_graph(
        &self,
        mode: RunMode,
        prompt: String,
        signature: Option<VulnerabilitySignature>,
    ) -> Result<OrchestrationResult, OrchestratorError> {
        let run_id = RunId::new();
        self.started(run_id, mode);
        let cancel = self.register(run_id);
        let outcome = self
            .workflow
            .start(run_id, self.graph.clone(), self.bindings.clone(), Some(prompt), &cancel)
            .await;
        let result = match outcome {
            Ok(outcome) => Ok(self.after_graph(run_id, mode, outcome, signature, &cancel).await),
            Err(e) => Err(e.into()),
        };
        self.unregister(run_id);
        result
    }

    async fn after_graph(
        &self,
        run_id: RunId,
        mode: RunMode,
        outcome: WorkflowOutcome,
        signature: Option<VulnerabilitySignature>,
        cancel: &CancellationToken,
    ) -> OrchestrationResult {
        let phase = outcome.phase_result(TASK_GRAPH_PHASE, true);
        self.note_abort(run_id, &phase);

        if let WorkflowOutcome::AwaitingInput(run) = outcome {
            let Some(question) = run.pending_question().cloned() else {
                return self.finish(run_id, vec![phase]);
            };
            return self
                .suspend(
                    run_id,
                    vec![phase],
                    Suspend {
                        requested_by: question.agent,
                        task_id: Some(question.task_id),
                        message: question.message,
                        snapshot: SuspendedRun::Workflow {
                            run_id,
                            mode,
                            run,
                            signature,
                        },
                    },
                )
                .await;
        }

        let seed = match (mode, phase.output.clone()) {
            (RunMode::Pipeline, Some(output)) => output,
            _ => return self.finish(run_id, vec![phase]),
        };
        info!(run_id = %run_id, "Task graph finished; starting swarm");
        match self.swarm.run(run_id, self.swarm_request(seed, signature), cancel).await {
            Ok(outcome) => self.after_swarm(run_id, mode, vec![phase], outcome).await,
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Swarm phase rejected");
                self.finish(run_id, vec![phase, swarm_phase_failure(e.to_string())])
            }
        }
    }

    async fn after_swarm(
        &self,
        run_id: RunId,
        mode: RunMode,
        mut phases: Vec<PhaseResult>,
        outcome: SwarmOutcome,
    ) -> OrchestrationResult {
        let phase = outcome.phase_result(SWARM_PHASE, true);
        self.note_abort(run_id, &phase);

        match outcome {
            SwarmOutcome::AwaitingInput {
                state,
                requested_by,
                message,
            } => {
                let completed = phases.clone();
                phases.push(phase);
                self.suspend(
                    run_id,
                    phases,
                    Suspend {
                        requested_by,
                        task_id: None,
                        message,
                        snapshot: SuspendedRun::Swarm {
                            run_id,
                            mode,
                            completed,
                            state,
                        },
                    },
                )
                .await
            }
            _ => {
                phases.push(phase);
                self.finish(run_id, phases)
            }
        }
    }

    async fn suspend(&self, run_id: RunId, phases: Vec<PhaseResult>, suspend: Suspend) -> OrchestrationResult {
        self.reap_expired().await;
        let conversation_id = ConversationId(run_id.0);
        let checkpoint = self
            .gate
            .request_input(
                InputRequest {
                    conversation_id,
                    requested_by: suspend.requested_by.clone(),
                    task_id: suspend.task_id,
                    message: suspend.message,
                },
                suspend.snapshot,
            )
            .await;
        self.suspended
            .lock()
            .insert(run_id, checkpoint.resumption_token.clone());
        self.event_bus.publish_run_event(RunEvent::RunSuspended {
            run_id,
            conversation_id,
            requested_by: suspend.requested_by,
            suspended_at: Utc::now(),
        });
        ResultAggregator::aggregate(run_id, phases, Some(checkpoint))
    }

    fn finish(&self, run_id: RunId, phases: Vec<PhaseResult>) -> OrchestrationResult {
        let result = ResultAggregator::aggregate(run_id, phases, None);
        metrics::counter!("vulnagent_runs_finished_total", "status" => result.status.to_string()).increment(1);
        info!(run_id = %run_id, status = %result.status, "Run finished");
        self.event_bus.publish_run_event(RunEvent::RunFinished {
            run_id,
            status: result.status,
            finished_at: Utc::now(),
        });
        result
    }

    fn note_abort(&self, run_id: RunId, phase: &PhaseResult) {
        if let PhaseStatus::Aborted { reason } = &phase.status {
            self.event_bus.publish_run_event(RunEvent::PhaseAborted {
                run_id,
                phase: phase.name.clone(),
                reason: reason.clone(),
                aborted_at: Utc::now(),
            });
        }
    }

    fn swarm_request(&self, message: String, signature: Option<VulnerabilitySignature>) -> SwarmRequest {
        SwarmRequest {
            roster: self.roster.clone(),
            entry_agent: None,
            initial_message: message,
            signature,
        }
    }

    fn started(&self, run_id: RunId, mode: RunMode) {
        metrics::counter!("vulnagent_runs_started_total", "mode" => mode.to_string()).increment(1);
        info!(run_id = %run_id, mode = %mode, "Run started");
        self.event_bus.publish_run_event(RunEvent::RunStarted {
            run_id,
            mode,
            started_at: Utc::now(),
        });
    }

    fn register(&self, run_id: RunId) -> CancellationToken {
        let token = CancellationToken::new();
        self.active.lock().insert(run_id, token.clone());
        token
    }

    fn unregister(&self, run_id: RunId) {
        self.active.lock().remove(&run_id);
    }
}

fn swarm_phase_failure(error: String) -> PhaseResult {
    PhaseResult {
        name: SWARM_PHASE.to_string(),
        kind: PhaseKind::Swarm,
        required: true,
        status: PhaseStatus::Failed { error },
        output: None,
        diagnostics: PhaseDiagnostics::Swarm {
            handoffs: Vec::new(),
            iterations: 0,
            elapsed: Duration::ZERO,
            failures: Vec::new(),
            stored_records: Vec::new(),
            unapproved_records: Vec::new(),
        },
    }
}
