// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Task Graph Runner Application Service
//!
//! Drives a [`TaskGraph`] to completion through the [`DependencyScheduler`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Dispatch ready tasks to their bound agents, record outcomes
//! - **Dependencies:** Domain (TaskGraph, AgentInvoker), Infrastructure (EventBus)
//!
//! # Dispatch Loop
//!
//! ```text
//! loop {
//!     batch = scheduler.next_ready_batch()        // priority desc, id asc
//!     claim up to max_parallel_tasks from batch
//!     invoke claimed tasks concurrently (node_timeout each)
//!     Completion        -> report Completed, keep output
//!     HumanInputRequest -> task stays Running, queue the question
//!     error / timeout   -> report Failed
//!     if a question is queued: suspend
//!     if nothing was dispatched: finished
//! }
//! ```
//!
//! The whole run shares one `execution_timeout` budget; time spent suspended
//! does not count against it.

use crate::application::scheduler::{DependencyScheduler, SchedulerSnapshot};
use crate::domain::agent::{AgentIdentity, AgentName, AgentTurn, RoleBindings};
use crate::domain::checkpoint::HumanResponse;
use crate::domain::config::WorkflowLimits;
use crate::domain::events::TaskEvent;
use crate::domain::invoker::{
    invoke_with_deadline, AgentInvoker, ContextMessage, InvocationContext, InvocationError,
    NodeFailure,
};
use crate::domain::result::{AbortReason, PhaseDiagnostics, PhaseKind, PhaseResult, PhaseStatus, RunId};
use crate::domain::task_graph::{TaskGraph, TaskId, TaskNode, TaskOutcome, TaskState};
use crate::domain::validation::ValidationError;
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A task whose agent is waiting on a human answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInput {
    pub task_id: TaskId,
    pub agent: AgentName,
    pub message: String,
}

/// Complete, resumable state of one task graph run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: RunId,
    pub graph: TaskGraph,
    pub bindings: RoleBindings,
    pub initial_input: Option<String>,
    pub scheduler: SchedulerSnapshot,
    pub outputs: BTreeMap<TaskId, String>,
    pub failures: Vec<NodeFailure>,
    /// Front entry is the question currently put to the human.
    pub awaiting: VecDeque<PendingInput>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

impl WorkflowRun {
    pub fn pending_question(&self) -> Option<&PendingInput> {
        self.awaiting.front()
    }

    /// Output of the graph's sink tasks; a single sink yields its output
    /// verbatim.
    fn sink_output(&self) -> Option<String> {
        let sinks = self.graph.sinks();
        if let [only] = sinks.as_slice() {
            return self.outputs.get(&only.id).cloned();
        }
        let parts: Vec<String> = sinks
            .iter()
            .filter_map(|n| self.outputs.get(&n.id).map(|o| format!("[{}]\n{}", n.id, o)))
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }

    fn unfinished(&self) -> Vec<&TaskId> {
        self.scheduler
            .states
            .iter()
            .filter(|(_, s)| **s != TaskState::Completed)
            .map(|(id, _)| id)
            .collect()
    }

    fn diagnostics(&self) -> PhaseDiagnostics {
        PhaseDiagnostics::TaskGraph {
            task_states: self.scheduler.states.clone(),
            task_outputs: self.outputs.clone(),
            failures: self.failures.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum WorkflowOutcome {
    /// No task is running and none can become ready.
    Settled(WorkflowRun),
    /// An agent asked for human input; see [`WorkflowRun::pending_question`].
    AwaitingInput(WorkflowRun),
    Aborted(WorkflowRun, AbortReason),
}

impl WorkflowOutcome {
    pub fn run(&self) -> &WorkflowRun {
        match self {
            WorkflowOutcome::Settled(run)
            | WorkflowOutcome::AwaitingInput(run)
            | WorkflowOutcome::Aborted(run, _) => run,
        }
    }

    pub fn into_run(self) -> WorkflowRun {
        match self {
            WorkflowOutcome::Settled(run)
            | WorkflowOutcome::AwaitingInput(run)
            | WorkflowOutcome::Aborted(run, _) => run,
        }
    }

    /// Summarize as a phase. A graph phase only has output when every task
    /// completed.
    pub fn phase_result(&self, name: &str, required: bool) -> PhaseResult {
        let run = self.run();
        let (status, output) = match self {
            WorkflowOutcome::Settled(run) => {
                let unfinished = run.unfinished();
                if unfinished.is_empty() {
                    (PhaseStatus::Completed, run.sink_output())
                } else {
                    let ids: Vec<&str> = unfinished.iter().map(|id| id.as_str()).collect();
                    (
                        PhaseStatus::Failed {
                            error: format!("tasks did not complete: {}", ids.join(", ")),
                        },
                        None,
                    )
                }
            }
            WorkflowOutcome::AwaitingInput(_) => (PhaseStatus::Suspended, None),
            WorkflowOutcome::Aborted(_, reason) => (
                PhaseStatus::Aborted {
                    reason: reason.clone(),
                },
                None,
            ),
        };
        PhaseResult {
            name: name.to_string(),
            kind: PhaseKind::TaskGraph,
            required,
            status,
            output,
            diagnostics: run.diagnostics(),
        }
    }
}

struct Dispatch {
    node: TaskNode,
    agent: AgentIdentity,
    input: String,
    human_response: Option<String>,
}

pub struct WorkflowRunner {
    invoker: Arc<dyn AgentInvoker>,
    limits: WorkflowLimits,
    event_bus: Option<EventBus>,
}

impl WorkflowRunner {
    pub fn new(invoker: Arc<dyn AgentInvoker>, limits: WorkflowLimits) -> Result<Self, ValidationError> {
        limits.validate()?;
        Ok(Self {
            invoker,
            limits,
            event_bus: None,
        })
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub async fn start(
        &self,
        run_id: RunId,
        graph: TaskGraph,
        bindings: RoleBindings,
        initial_input: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome, ValidationError> {
        bindings.check(&graph)?;

        info!(run_id = %run_id, tasks = graph.len(), "Starting task graph run");
        let scheduler = DependencyScheduler::from_graph(graph.clone()).snapshot();
        let run = WorkflowRun {
            run_id,
            graph,
            bindings,
            initial_input,
            scheduler,
            outputs: BTreeMap::new(),
            failures: Vec::new(),
            awaiting: VecDeque::new(),
            elapsed: Duration::ZERO,
        };
        Ok(self.drive(run, None, cancel).await)
    }

    /// Continue a run suspended on its front question.
    pub async fn resume(
        &self,
        mut run: WorkflowRun,
        response: HumanResponse,
        cancel: &CancellationToken,
    ) -> WorkflowOutcome {
        let answered = run.awaiting.pop_front();
        if answered.is_none() {
            warn!(run_id = %run.run_id, "Resume requested for a run with no open question");
        }
        self.drive(run, answered.map(|q| (q, response)), cancel).await
    }

    async fn drive(
        &self,
        mut run: WorkflowRun,
        mut answered: Option<(PendingInput, HumanResponse)>,
        cancel: &CancellationToken,
    ) -> WorkflowOutcome {
        let scheduler = DependencyScheduler::restore(run.graph.clone(), &run.scheduler);
        let started = Instant::now();
        let deadline = started + self.limits.execution_timeout.saturating_sub(run.elapsed);
        let run_token = cancel.child_token();

        let abort = loop {
            if cancel.is_cancelled() {
                break Some(AbortReason::Cancelled);
            }

            let dispatches = match answered.take() {
                Some((question, response)) => self.resumed_dispatch(&run, question, response),
                None if !run.awaiting.is_empty() => break None,
                None => self.claim_batch(&run, &scheduler),
            };
            if dispatches.is_empty() {
                break None;
            }

            let calls = dispatches.iter().map(|d| self.dispatch(&run, d, &run_token));
            let results = match tokio::time::timeout_at(deadline, join_all(calls)).await {
                Ok(results) => results,
                Err(_) => {
                    run_token.cancel();
                    warn!(run_id = %run.run_id, "Task graph execution budget exhausted");
                    break Some(AbortReason::ExecutionTimeout {
                        budget: self.limits.execution_timeout,
                    });
                }
            };

            for (dispatch, result) in dispatches.into_iter().zip(results) {
                self.apply(&mut run, &scheduler, dispatch, result, cancel);
            }
        };

        run.scheduler = scheduler.snapshot();
        run.elapsed += started.elapsed();

        match abort {
            Some(reason) => {
                metrics::counter!("vulnagent_runs_aborted_total", "reason" => reason.code()).increment(1);
                WorkflowOutcome::Aborted(run, reason)
            }
            None if !run.awaiting.is_empty() => WorkflowOutcome::AwaitingInput(run),
            None => {
                info!(
                    run_id = %run.run_id,
                    completed = run.scheduler.count(TaskState::Completed),
                    failed = run.scheduler.count(TaskState::Failed),
                    blocked = scheduler.blocked().len(),
                    "Task graph settled"
                );
                WorkflowOutcome::Settled(run)
            }
        }
    }

    fn claim_batch(&self, run: &WorkflowRun, scheduler: &DependencyScheduler) -> Vec<Dispatch> {
        let mut dispatches = Vec::new();
        for node in scheduler.next_ready_batch() {
            if dispatches.len() >= self.limits.max_parallel_tasks {
                break;
            }
            let Some(agent) = run.bindings.resolve(&node.assigned_role).cloned() else {
                continue;
            };
            match scheduler.claim(&node.id) {
                Ok(true) => dispatches.push(Dispatch {
                    input: node.description.clone(),
                    node,
                    agent,
                    human_response: None,
                }),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Failed to claim task"),
            }
        }
        dispatches
    }

    fn resumed_dispatch(
        &self,
        run: &WorkflowRun,
        question: PendingInput,
        response: HumanResponse,
    ) -> Vec<Dispatch> {
        let node = run.graph.get(&question.task_id).cloned();
        let agent = node
            .as_ref()
            .and_then(|n| run.bindings.resolve(&n.assigned_role).cloned());
        match (node, agent) {
            (Some(node), Some(agent)) => vec![Dispatch {
                node,
                agent,
                input: response.as_str().to_string(),
                human_response: Some(response.as_str().to_string()),
            }],
            _ => {
                warn!(task_id = %question.task_id, "Answered task is no longer part of the graph");
                Vec::new()
            }
        }
    }

    fn context_for(&self, run: &WorkflowRun, dispatch: &Dispatch) -> InvocationContext {
        let mut context = InvocationContext::for_run(run.run_id);
        context.task_id = Some(dispatch.node.id.clone());

        if let Some(input) = &run.initial_input {
            context.history.push(ContextMessage {
                author: "user".into(),
                content: input.clone(),
            });
        }
        for dep in &dispatch.node.dependencies {
            if let Some(output) = run.outputs.get(dep) {
                context.history.push(ContextMessage {
                    author: dep.to_string(),
                    content: output.clone(),
                });
            }
        }
        context.human_response = dispatch.human_response.clone();
        context
    }

    async fn dispatch(
        &self,
        run: &WorkflowRun,
        dispatch: &Dispatch,
        token: &CancellationToken,
    ) -> Result<AgentTurn, InvocationError> {
        let context = self.context_for(run, dispatch);
        debug!(run_id = %run.run_id, task_id = %dispatch.node.id, agent = %dispatch.agent.name, "Dispatching task");
        if let Some(bus) = &self.event_bus {
            bus.publish_task_event(TaskEvent::TaskDispatched {
                run_id: run.run_id,
                task_id: dispatch.node.id.clone(),
                agent: dispatch.agent.name.clone(),
                dispatched_at: Utc::now(),
            });
        }
        invoke_with_deadline(
            self.invoker.as_ref(),
            &dispatch.agent,
            &dispatch.input,
            &context,
            self.limits.node_timeout,
            token,
        )
        .await
    }

    fn apply(
        &self,
        run: &mut WorkflowRun,
        scheduler: &DependencyScheduler,
        dispatch: Dispatch,
        result: Result<AgentTurn, InvocationError>,
        cancel: &CancellationToken,
    ) {
        let task_id = dispatch.node.id;
        let outcome = match result {
            Ok(AgentTurn::Completion(completion)) => {
                if completion.proposed_record.is_some() {
                    debug!(task_id = %task_id, "Ignoring knowledge proposal outside a swarm");
                }
                run.outputs.insert(task_id.clone(), completion.output);
                TaskOutcome::Completed
            }
            Ok(AgentTurn::Handoff(handoff)) => {
                warn!(
                    task_id = %task_id,
                    target = %handoff.target,
                    "Handoff has no meaning in a task graph; keeping message as output"
                );
                run.outputs.insert(task_id.clone(), handoff.message);
                TaskOutcome::Completed
            }
            Ok(AgentTurn::HumanInputRequest(request)) => {
                info!(task_id = %task_id, agent = %dispatch.agent.name, "Task awaiting human input");
                run.awaiting.push_back(PendingInput {
                    task_id,
                    agent: dispatch.agent.name,
                    message: request.message,
                });
                return;
            }
            Err(InvocationError::Cancelled { .. }) if cancel.is_cancelled() => return,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Task failed");
                run.failures
                    .push(NodeFailure::new(dispatch.agent.name, Some(task_id.clone()), &e));
                TaskOutcome::Failed
            }
        };

        match outcome {
            TaskOutcome::Completed => metrics::counter!("vulnagent_tasks_completed_total").increment(1),
            TaskOutcome::Failed => metrics::counter!("vulnagent_tasks_failed_total").increment(1),
        }
        if let Err(e) = scheduler.report(&task_id, outcome) {
            warn!(error = %e, "Scheduler rejected task report");
            return;
        }
        if let Some(bus) = &self.event_bus {
            bus.publish_task_event(TaskEvent::TaskReported {
                run_id: run.run_id,
                task_id,
                outcome,
                reported_at: Utc::now(),
            });
        }
    }
}
