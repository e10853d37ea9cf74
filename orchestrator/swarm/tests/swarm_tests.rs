// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the handoff swarm
//!
//! Each test scripts agent turns with `ScriptedInvoker`, drives a
//! `SwarmController` and checks the outcome against the configured bounds.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vulnagent_core::domain::agent::{AgentIdentity, AgentName, AgentTurn, Completion, HandoffRequest, Roster};
use vulnagent_core::domain::checkpoint::HumanResponse;
use vulnagent_core::domain::config::SwarmBounds;
use vulnagent_core::domain::knowledge::{KnowledgeStore, MemoryRecord, VulnerabilitySignature};
use vulnagent_core::domain::result::{AbortReason, PhaseDiagnostics, PhaseStatus, RunId};
use vulnagent_core::domain::validation::ValidationError;
use vulnagent_core::infrastructure::event_bus::{EventBus, OrchestrationEvent};
use vulnagent_core::infrastructure::knowledge_store::InMemoryKnowledgeStore;
use vulnagent_core::infrastructure::scripted_invoker::ScriptedInvoker;
use vulnagent_swarm::{SwarmController, SwarmOutcome, SwarmRequest, SwarmStatus};

fn name(s: &str) -> AgentName {
    AgentName::new(s).unwrap()
}

fn roster(names: &[&str]) -> Roster {
    Roster::new(
        names
            .iter()
            .map(|n| AgentIdentity::new(name(n), format!("You are {n}")))
            .collect(),
    )
    .unwrap()
}

fn bounds() -> SwarmBounds {
    SwarmBounds {
        max_handoffs: 10,
        max_iterations: 20,
        execution_timeout: Duration::from_secs(60),
        node_timeout: Duration::from_secs(10),
        repetitive_handoff_detection_window: 0,
        repetitive_handoff_min_unique_agents: 0,
    }
}

fn request(names: &[&str]) -> SwarmRequest {
    SwarmRequest {
        roster: roster(names),
        entry_agent: None,
        initial_message: "CVE-2024-3094 on build hosts".into(),
        signature: None,
    }
}

fn handoff(to: &str, message: &str) -> AgentTurn {
    AgentTurn::handoff(name(to), message)
}

#[tokio::test]
async fn test_ping_pong_aborts_on_fourth_handoff() {
    let invoker = Arc::new(ScriptedInvoker::new());
    for i in 0..5 {
        invoker.push(name("a"), handoff("b", &format!("a{i}")));
        invoker.push(name("b"), handoff("a", &format!("b{i}")));
    }
    let bounds = SwarmBounds {
        max_handoffs: 8,
        repetitive_handoff_detection_window: 4,
        repetitive_handoff_min_unique_agents: 2,
        ..bounds()
    };
    let controller = SwarmController::new(invoker.clone(), bounds).unwrap();

    let outcome = controller
        .run(RunId::new(), request(&["a", "b"]), &CancellationToken::new())
        .await
        .unwrap();

    match &outcome {
        SwarmOutcome::Aborted { state, reason } => {
            assert_eq!(
                reason,
                &AbortReason::RepetitiveHandoffDetected {
                    window: 4,
                    unique_agents: 1,
                    required: 2
                }
            );
            assert_eq!(state.handoff_log.len(), 4);
            assert_eq!(state.last_output.as_deref(), Some("b1"));
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(invoker.calls().len(), 4);

    let phase = outcome.phase_result("swarm", true);
    assert!(phase.is_aborted());
    assert_eq!(phase.output.as_deref(), Some("b1"));
}

#[tokio::test]
async fn test_handoff_limit_never_exceeded() {
    let invoker = Arc::new(ScriptedInvoker::new());
    for _ in 0..10 {
        invoker.push(name("a"), handoff("b", "over to b"));
        invoker.push(name("b"), handoff("c", "over to c"));
        invoker.push(name("c"), handoff("a", "over to a"));
    }
    let bounds = SwarmBounds {
        max_handoffs: 3,
        ..bounds()
    };
    let controller = SwarmController::new(invoker.clone(), bounds).unwrap();

    let outcome = controller
        .run(RunId::new(), request(&["a", "b", "c"]), &CancellationToken::new())
        .await
        .unwrap();

    let SwarmOutcome::Aborted { state, reason } = outcome else {
        panic!("expected handoff limit abort");
    };
    assert_eq!(reason, AbortReason::HandoffLimitExceeded { limit: 3 });
    assert_eq!(state.handoff_log.len(), 3);
    let seqs: Vec<u64> = state.handoff_log.events().iter().map(|e| e.sequence).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_zero_handoffs_still_allows_completion() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(name("solo"), AgentTurn::complete("patched"));
    let bounds = SwarmBounds {
        max_handoffs: 0,
        ..bounds()
    };
    let controller = SwarmController::new(invoker, bounds).unwrap();

    let outcome = controller
        .run(RunId::new(), request(&["solo"]), &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, SwarmOutcome::Completed { ref output, .. } if output == "patched"));
}

#[tokio::test]
async fn test_iteration_limit() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(name("a"), AgentTurn::ask_human("first?"));
    invoker.push(name("a"), AgentTurn::ask_human("second?"));
    let bounds = SwarmBounds {
        max_iterations: 2,
        ..bounds()
    };
    let controller = SwarmController::new(invoker.clone(), bounds).unwrap();
    let run_id = RunId::new();
    let cancel = CancellationToken::new();

    let outcome = controller.run(run_id, request(&["a"]), &cancel).await.unwrap();
    let state = outcome.into_state();
    let outcome = controller.resume(run_id, state, HumanResponse::new("go on"), &cancel).await;
    let state = outcome.into_state();
    assert_eq!(state.iteration_count, 2);

    let outcome = controller.resume(run_id, state, HumanResponse::new("again"), &cancel).await;
    assert!(matches!(
        outcome,
        SwarmOutcome::Aborted {
            reason: AbortReason::IterationLimitExceeded { limit: 2 },
            ..
        }
    ));
    assert_eq!(invoker.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_execution_timeout_aborts_run() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push_delayed(name("a"), handoff("b", "first"), Duration::from_secs(8));
    invoker.push_delayed(name("b"), handoff("a", "second"), Duration::from_secs(8));
    invoker.push_delayed(name("a"), AgentTurn::complete("too late"), Duration::from_secs(8));
    let bounds = SwarmBounds {
        execution_timeout: Duration::from_secs(20),
        ..bounds()
    };
    let controller = SwarmController::new(invoker, bounds).unwrap();

    let outcome = controller
        .run(RunId::new(), request(&["a", "b"]), &CancellationToken::new())
        .await
        .unwrap();

    let SwarmOutcome::Aborted { state, reason } = outcome else {
        panic!("expected timeout");
    };
    assert_eq!(
        reason,
        AbortReason::ExecutionTimeout {
            budget: Duration::from_secs(20)
        }
    );
    assert_eq!(state.handoff_log.len(), 2);
    assert_eq!(state.last_output.as_deref(), Some("second"));
}

#[tokio::test(start_paused = true)]
async fn test_node_timeout_falls_back_to_last_output() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(name("a"), handoff("b", "draft plan"));
    invoker.push_delayed(name("b"), AgentTurn::complete("never"), Duration::from_secs(30));
    let controller = SwarmController::new(invoker, bounds()).unwrap();

    let outcome = controller
        .run(RunId::new(), request(&["a", "b"]), &CancellationToken::new())
        .await
        .unwrap();

    let SwarmOutcome::Completed { state, output } = outcome else {
        panic!("expected completion from last output");
    };
    assert_eq!(output, "draft plan");
    assert_eq!(state.failures.len(), 1);
    assert_eq!(state.failures[0].agent.as_str(), "b");
}

#[tokio::test]
async fn test_first_agent_failure_has_no_usable_output() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let controller = SwarmController::new(invoker, bounds()).unwrap();

    let outcome = controller
        .run(RunId::new(), request(&["a"]), &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SwarmOutcome::Aborted {
            reason: AbortReason::NoUsableOutput,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unknown_handoff_target_is_not_logged() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(name("a"), handoff("b", "to b"));
    invoker.push(name("b"), handoff("ghost", "to nobody"));
    let controller = SwarmController::new(invoker, bounds()).unwrap();

    let outcome = controller
        .run(RunId::new(), request(&["a", "b"]), &CancellationToken::new())
        .await
        .unwrap();

    let SwarmOutcome::Completed { state, output } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(output, "to b");
    assert_eq!(state.handoff_log.len(), 1);
    assert!(state.failures[0].error.contains("ghost"));
}

#[tokio::test]
async fn test_terminating_handoff_completes() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(
        name("a"),
        AgentTurn::Handoff(HandoffRequest {
            target: name("b"),
            message: "final report".into(),
            terminate: true,
        }),
    );
    let controller = SwarmController::new(invoker.clone(), bounds()).unwrap();

    let outcome = controller
        .run(RunId::new(), request(&["a", "b"]), &CancellationToken::new())
        .await
        .unwrap();

    let SwarmOutcome::Completed { state, output } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(output, "final report");
    assert_eq!(state.handoff_log.len(), 1);
    assert_eq!(invoker.calls().len(), 1);
}

#[tokio::test]
async fn test_entry_agent_must_be_in_roster() {
    let controller = SwarmController::new(Arc::new(ScriptedInvoker::new()), bounds()).unwrap();
    let mut req = request(&["a"]);
    req.entry_agent = Some(name("zed"));

    let err = controller
        .run(RunId::new(), req, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::UnknownEntryAgent(n) if n.as_str() == "zed"));
}

#[tokio::test]
async fn test_invalid_bounds_rejected() {
    let bounds = SwarmBounds {
        node_timeout: Duration::from_secs(120),
        execution_timeout: Duration::from_secs(60),
        ..bounds()
    };
    assert!(SwarmController::new(Arc::new(ScriptedInvoker::new()), bounds).is_err());
}

#[tokio::test]
async fn test_cancelled_run_aborts() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(name("a"), AgentTurn::complete("unused"));
    let controller = SwarmController::new(invoker.clone(), bounds()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = controller.run(RunId::new(), request(&["a"]), &cancel).await.unwrap();
    assert!(matches!(
        outcome,
        SwarmOutcome::Aborted {
            reason: AbortReason::Cancelled,
            ..
        }
    ));
    assert!(invoker.calls().is_empty());
}

#[tokio::test]
async fn test_human_input_suspends_and_same_agent_resumes() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(name("gatherer"), handoff("remediator", "openssl 3.0.1 on 12 hosts"));
    invoker.push(name("remediator"), AgentTurn::ask_human("Reboot allowed tonight?"));
    invoker.push(name("remediator"), AgentTurn::complete("Upgrade and reboot at 02:00"));
    let controller = SwarmController::new(invoker.clone(), bounds()).unwrap();
    let run_id = RunId::new();
    let cancel = CancellationToken::new();

    let outcome = controller
        .run(run_id, request(&["gatherer", "remediator"]), &cancel)
        .await
        .unwrap();
    let SwarmOutcome::AwaitingInput {
        state,
        requested_by,
        message,
    } = outcome
    else {
        panic!("expected suspension");
    };
    assert_eq!(requested_by.as_str(), "remediator");
    assert_eq!(message, "Reboot allowed tonight?");
    assert_eq!(state.status, SwarmStatus::Suspended);

    let outcome = controller
        .resume(run_id, state, HumanResponse::new("yes, after 01:00"), &cancel)
        .await;
    let SwarmOutcome::Completed { state, output } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(output, "Upgrade and reboot at 02:00");
    assert_eq!(state.handoff_log.len(), 1);

    let calls = invoker.calls();
    let last = calls.last().unwrap();
    assert_eq!(last.agent.as_str(), "remediator");
    assert_eq!(last.input, "yes, after 01:00");
    assert_eq!(last.context.human_response.as_deref(), Some("yes, after 01:00"));
    assert_eq!(last.context.history[0].author, "gatherer");
}

#[tokio::test]
async fn test_approved_proposal_is_stored() {
    let store = Arc::new(InMemoryKnowledgeStore::new("team-a"));
    let signature = VulnerabilitySignature::new("CVE-2024-3094");
    let proposal = MemoryRecord::new(signature.clone(), vec!["downgrade xz-utils".into()]);

    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(name("curator"), AgentTurn::ask_human("Store this remediation?"));
    invoker.push(
        name("curator"),
        AgentTurn::Completion(Completion {
            output: "stored".into(),
            proposed_record: Some(proposal.clone()),
        }),
    );
    let controller = SwarmController::new(invoker, bounds())
        .unwrap()
        .with_knowledge(store.clone());
    let run_id = RunId::new();
    let cancel = CancellationToken::new();

    let mut req = request(&["curator"]);
    req.signature = Some(signature.clone());
    let state = controller.run(run_id, req, &cancel).await.unwrap().into_state();
    let outcome = controller
        .resume(run_id, state, HumanResponse::new("Approved."), &cancel)
        .await;

    let phase = outcome.phase_result("swarm", true);
    let PhaseDiagnostics::Swarm { stored_records, unapproved_records, .. } = phase.diagnostics else {
        panic!("expected swarm diagnostics");
    };
    assert_eq!(stored_records.len(), 1);
    assert!(unapproved_records.is_empty());
    assert_eq!(store.query(&signature).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unapproved_proposal_is_held_back() {
    let store = Arc::new(InMemoryKnowledgeStore::new("team-a"));
    let signature = VulnerabilitySignature::new("CVE-2024-3094");

    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(
        name("curator"),
        AgentTurn::Completion(Completion {
            output: "proposal ready".into(),
            proposed_record: Some(MemoryRecord::new(signature.clone(), vec!["pin version".into()])),
        }),
    );
    let controller = SwarmController::new(invoker, bounds())
        .unwrap()
        .with_knowledge(store.clone());

    let outcome = controller
        .run(RunId::new(), request(&["curator"]), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.state().unapproved_records.len(), 1);
    assert!(outcome.state().stored_records.is_empty());
    assert!(store.query(&signature).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_prior_records_reach_the_agent() {
    let store = Arc::new(InMemoryKnowledgeStore::new("team-a"));
    let signature = VulnerabilitySignature::new("CVE-2023-4863");
    store
        .store(
            MemoryRecord::new(signature.clone(), vec!["update libwebp".into()]),
            &vulnagent_core::domain::knowledge::HumanApproval::granted("alice"),
        )
        .await
        .unwrap();

    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(name("remediator"), AgentTurn::complete("same fix as last time"));
    let controller = SwarmController::new(invoker.clone(), bounds())
        .unwrap()
        .with_knowledge(store);

    let mut req = request(&["remediator"]);
    req.signature = Some(signature);
    controller.run(RunId::new(), req, &CancellationToken::new()).await.unwrap();

    let calls = invoker.calls();
    assert_eq!(calls[0].context.prior_records.len(), 1);
    assert_eq!(calls[0].context.prior_records[0].remediation_steps, vec!["update libwebp"]);
}

#[tokio::test]
async fn test_handoffs_are_published() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.push(name("a"), handoff("b", "over"));
    invoker.push(name("b"), AgentTurn::complete("done"));
    let controller = SwarmController::new(invoker, bounds())
        .unwrap()
        .with_event_bus(bus);

    let outcome = controller
        .run(RunId::new(), request(&["a", "b"]), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.phase_result("swarm", true).status, PhaseStatus::Completed);

    let mut handoffs = 0;
    while let Ok(event) = rx.try_recv() {
        if let OrchestrationEvent::Swarm(vulnagent_core::domain::events::SwarmEvent::HandoffRecorded { handoff, .. }) = event {
            assert_eq!(handoff.to_agent.as_str(), "b");
            handoffs += 1;
        }
    }
    assert_eq!(handoffs, 1);
}
