// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for task graph execution
//!
//! These tests verify the path from a task graph to a finished run:
//! 1. Validate the graph (duplicates, dangling edges, cycles)
//! 2. Schedule ready tasks in priority order
//! 3. Run the graph against scripted agents
//! 4. Suspend at a human checkpoint and resume exactly once
//! 5. Aggregate phases into an orchestration result

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vulnagent_core::application::aggregator::ResultAggregator;
use vulnagent_core::application::checkpoint_gate::{CheckpointGate, InputRequest};
use vulnagent_core::application::scheduler::DependencyScheduler;
use vulnagent_core::application::workflow_runner::{WorkflowOutcome, WorkflowRun, WorkflowRunner};
use vulnagent_core::domain::agent::{AgentName, AgentTurn};
use vulnagent_core::domain::checkpoint::{CheckpointError, ConversationId, HumanResponse};
use vulnagent_core::domain::config::WorkflowLimits;
use vulnagent_core::domain::presets;
use vulnagent_core::domain::result::{OrchestrationStatus, PhaseStatus, RunId};
use vulnagent_core::domain::task_graph::{TaskGraph, TaskId, TaskNode, TaskOutcome, TaskState};
use vulnagent_core::domain::validation::ValidationError;
use vulnagent_core::infrastructure::scripted_invoker::ScriptedInvoker;
use vulnagent_core::infrastructure::workflow_parser::TaskGraphParser;

fn id(s: &str) -> TaskId {
    TaskId::new(s).unwrap()
}

fn name(s: &str) -> AgentName {
    AgentName::new(s).unwrap()
}

fn limits() -> WorkflowLimits {
    WorkflowLimits {
        node_timeout: Duration::from_secs(5),
        execution_timeout: Duration::from_secs(30),
        max_parallel_tasks: 4,
    }
}

fn ids(batch: impl Iterator<Item = TaskNode>) -> Vec<String> {
    batch.map(|n| n.id.to_string()).collect()
}

#[test]
fn test_vulnerability_chain_readiness() {
    let scheduler = DependencyScheduler::from_graph(presets::vulnerability_management_graph().unwrap());
    let gather = id(presets::GATHER_TASK);
    let plan = id(presets::PLAN_TASK);
    let critique = id(presets::CRITIQUE_TASK);

    assert_eq!(ids(scheduler.next_ready_batch()), vec![presets::GATHER_TASK]);
    assert!(scheduler.claim(&gather).unwrap());
    assert!(scheduler.next_ready_batch().next().is_none());

    scheduler.report(&gather, TaskOutcome::Completed).unwrap();
    assert_eq!(ids(scheduler.next_ready_batch()), vec![presets::PLAN_TASK]);
    assert!(scheduler.claim(&plan).unwrap());
    scheduler.report(&plan, TaskOutcome::Completed).unwrap();

    assert_eq!(ids(scheduler.next_ready_batch()), vec![presets::CRITIQUE_TASK]);
    assert!(scheduler.claim(&critique).unwrap());
    scheduler.report(&critique, TaskOutcome::Completed).unwrap();
    assert!(scheduler.is_settled());
    assert_eq!(scheduler.snapshot().count(TaskState::Completed), 3);
}

#[test]
fn test_cycle_rejected_at_submission() {
    let err = DependencyScheduler::submit(vec![
        TaskNode::new(id("a"), "A", "x").depends_on(id("b")),
        TaskNode::new(id("b"), "B", "x").depends_on(id("a")),
    ])
    .unwrap_err();

    let ValidationError::CyclicDependency(path) = err else {
        panic!("expected cycle, got {err:?}");
    };
    let members: BTreeSet<String> = path.iter().map(ToString::to_string).collect();
    assert_eq!(members, BTreeSet::from(["a".to_string(), "b".to_string()]));
}

#[test]
fn test_dangling_dependency_rejected() {
    let err = TaskGraph::new(vec![TaskNode::new(id("a"), "A", "x").depends_on(id("missing"))]).unwrap_err();
    assert!(matches!(err, ValidationError::DanglingDependency { .. }));
}

/// Readiness property over a layered graph: whatever order tasks complete
/// in, a task is offered only after all of its dependencies completed.
#[test]
fn test_ready_tasks_only_after_dependencies() {
    let mut nodes = Vec::new();
    for layer in 0..4 {
        for i in 0..3 {
            let mut node = TaskNode::new(id(&format!("t{layer}{i}")), "work", "x").with_priority(i);
            if layer > 0 {
                node = node.depends_on(id(&format!("t{}{}", layer - 1, i)));
                node = node.depends_on(id(&format!("t{}{}", layer - 1, (i + 1) % 3)));
            }
            nodes.push(node);
        }
    }
    let scheduler = DependencyScheduler::submit(nodes).unwrap();

    let mut completed: BTreeSet<TaskId> = BTreeSet::new();
    let mut rounds = 0;
    while !scheduler.is_settled() {
        rounds += 1;
        assert!(rounds < 20, "scheduler made no progress");
        let batch: Vec<TaskNode> = scheduler.next_ready_batch().collect();
        assert!(!batch.is_empty());

        let priorities: Vec<i32> = batch.iter().map(|n| n.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);

        // complete in reverse order of offer
        for node in batch.iter().rev() {
            assert!(node.dependencies.iter().all(|d| completed.contains(d)));
            assert!(scheduler.claim(&node.id).unwrap());
        }
        for node in batch.into_iter().rev() {
            scheduler.report(&node.id, TaskOutcome::Completed).unwrap();
            completed.insert(node.id);
        }
    }
    assert_eq!(completed.len(), 12);
    assert_eq!(rounds, 4);
}

#[tokio::test]
async fn test_preset_workflow_with_human_checkpoint() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(name(presets::GATHERER), AgentTurn::complete("CVE-2024-6387 on 4 bastion hosts"));
    invoker.push(name(presets::REMEDIATOR), AgentTurn::ask_human("Patch bastions during business hours?"));
    invoker.push(name(presets::REMEDIATOR), AgentTurn::complete("Upgrade openssh to 9.8p1 tonight"));
    invoker.push(name(presets::CRITIC), AgentTurn::complete("Plan approved: low blast radius"));

    let runner = WorkflowRunner::new(invoker.clone(), limits()).unwrap();
    let gate: CheckpointGate<WorkflowRun> = CheckpointGate::new(None);
    let cancel = CancellationToken::new();
    let run_id = RunId::new();

    let outcome = runner
        .start(
            run_id,
            presets::vulnerability_management_graph().unwrap(),
            presets::vulnerability_bindings().unwrap(),
            Some("Analyze vulnerability status".into()),
            &cancel,
        )
        .await
        .unwrap();
    let WorkflowOutcome::AwaitingInput(run) = outcome else {
        panic!("expected suspension");
    };
    let question = run.pending_question().cloned().unwrap();
    assert_eq!(question.agent.as_str(), presets::REMEDIATOR);
    assert_eq!(run.scheduler.state(&id(presets::PLAN_TASK)), Some(TaskState::Running));

    let suspended_phase = WorkflowOutcome::AwaitingInput(run.clone()).phase_result("graph", true);
    let checkpoint = gate
        .request_input(
            InputRequest {
                conversation_id: ConversationId::new(),
                requested_by: question.agent.clone(),
                task_id: Some(question.task_id.clone()),
                message: question.message.clone(),
            },
            run,
        )
        .await;
    let interim = ResultAggregator::aggregate(run_id, vec![suspended_phase], Some(checkpoint.clone()));
    assert_eq!(interim.status, OrchestrationStatus::AwaitingHumanInput);

    let continuation = gate
        .resume(&checkpoint.resumption_token, HumanResponse::new("After 22:00 only"))
        .await
        .unwrap();
    let outcome = runner
        .resume(continuation.snapshot, continuation.response, &cancel)
        .await;
    let phase = outcome.phase_result("graph", true);
    assert_eq!(phase.status, PhaseStatus::Completed);
    assert_eq!(phase.output.as_deref(), Some("Plan approved: low blast radius"));

    let result = ResultAggregator::aggregate(run_id, vec![phase], None);
    assert_eq!(result.status, OrchestrationStatus::Completed);
    assert_eq!(result.final_output(), Some("Plan approved: low blast radius"));

    // resumed exactly once
    let again = gate
        .resume(&checkpoint.resumption_token, HumanResponse::new("again"))
        .await
        .unwrap_err();
    assert!(matches!(again, CheckpointError::InvalidResumption(_)));

    let remediator_calls: Vec<_> = invoker
        .calls()
        .into_iter()
        .filter(|c| c.agent.as_str() == presets::REMEDIATOR)
        .collect();
    assert_eq!(remediator_calls.len(), 2);
    assert_eq!(remediator_calls[1].input, "After 22:00 only");
    assert!(invoker.remaining().is_empty());
}

#[tokio::test]
async fn test_parsed_diamond_runs_branches_together() {
    let yaml = r#"
apiVersion: vulnagent.dev/v1
kind: TaskGraph
metadata:
  name: diamond
spec:
  agents:
    - name: scanner
      role_prompt: "scan"
    - name: reviewer
      role_prompt: "review"
  tasks:
    - id: scan
      description: Scan
      role: scanner
    - id: review_os
      description: Review OS packages
      role: reviewer
      priority: 2
      depends_on: [scan]
    - id: review_libs
      description: Review libraries
      role: reviewer
      priority: 1
      depends_on: [scan]
    - id: report
      description: Report
      role: scanner
      depends_on: [review_os, review_libs]
"#;
    let definition = TaskGraphParser::parse_yaml(yaml).unwrap();

    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(name("scanner"), AgentTurn::complete("scan done"));
    invoker.push(name("reviewer"), AgentTurn::complete("os reviewed"));
    invoker.push(name("reviewer"), AgentTurn::complete("libs reviewed"));
    invoker.push(name("scanner"), AgentTurn::complete("final report"));

    let runner = WorkflowRunner::new(invoker.clone(), limits()).unwrap();
    let outcome = runner
        .start(
            RunId::new(),
            definition.graph,
            definition.bindings,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, WorkflowOutcome::Settled(_)));
    let run = outcome.into_run();
    assert_eq!(run.outputs.get(&id("report")).map(String::as_str), Some("final report"));

    let order: Vec<String> = invoker.calls().into_iter().map(|c| c.input).collect();
    assert_eq!(order.len(), 4);
    // higher priority branch claimed first within the batch
    assert_eq!(order[1], "Review OS packages");
    assert_eq!(order[2], "Review libraries");
}
