// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain model for VulnAgent orchestration.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Value objects, ports and invariants shared by the task graph
//!   runner, the swarm controller and the orchestrator facade

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod events;
pub mod handoff;
pub mod invoker;
pub mod knowledge;
pub mod presets;
pub mod result;
pub mod task_graph;
pub mod validation;
