// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application services: scheduling, task graph execution, human checkpoints
//! and result aggregation.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Use cases built on the domain ports

pub mod aggregator;
pub mod checkpoint_gate;
pub mod scheduler;
pub mod workflow_runner;
