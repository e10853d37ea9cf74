// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure adapters: event fan-out, in-memory knowledge, scripted
//! invocation and manifest parsing.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Concrete implementations behind the domain ports

pub mod event_bus;
pub mod knowledge_store;
pub mod scripted_invoker;
pub mod workflow_parser;
