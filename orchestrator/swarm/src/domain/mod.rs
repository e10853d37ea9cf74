// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Swarm domain: run state, handoff log and the repetition guard.

pub mod swarm;

pub use swarm::*;
