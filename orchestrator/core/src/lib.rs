// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `vulnagent-orchestrator-core`
//!
//! Task graph scheduling, human checkpoints and result aggregation for
//! multi-agent vulnerability management runs.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | agents, task graphs, checkpoints, knowledge, results, config |
//! | [`application`] | Application | `DependencyScheduler`, `WorkflowRunner`, `CheckpointGate`, `ResultAggregator` |
//! | [`infrastructure`] | Infrastructure | `EventBus`, `InMemoryKnowledgeStore`, `ScriptedInvoker`, `TaskGraphParser` |
//!
//! The free-handoff swarm lives in `vulnagent-orchestrator-swarm` and builds
//! on the ports defined here.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
