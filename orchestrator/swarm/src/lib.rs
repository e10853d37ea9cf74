// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `vulnagent-orchestrator-swarm` — Free Handoff Swarm
//!
//! Runs a roster of specialized agents that transfer control to one another
//! by name, under hard bounds on handoffs, iterations and wall-clock time.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `SwarmRunState`, `HandoffLog`, `detect_repetition` |
//! | [`application`] | Application | `SwarmController`, `SwarmOutcome` |
//!
//! ## Key Concepts
//!
//! - **Handoff**: an agent names a peer and a message; the peer runs next.
//! - **Bounds**: `max_handoffs`, `max_iterations`, `execution_timeout` and
//!   `node_timeout` are hard limits; crossing one aborts with a distinct
//!   [`AbortReason`](vulnagent_core::domain::result::AbortReason).
//! - **Repetition guard**: a full window of handoffs among too few agents
//!   aborts the run.
//! - **Suspension**: a human input request parks the whole run state; the
//!   answer resumes the same agent.

pub mod application;
pub mod domain;

pub use application::{SwarmController, SwarmOutcome, SwarmRequest};
pub use domain::*;
