// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! VulnAgent CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers and the in-process [`orchestrator::Orchestrator`]

pub mod commands;
pub mod orchestrator;

pub use orchestrator::{Orchestrator, OrchestratorError, SuspendedRun};
