// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `contend-detector`: Allocation Graph Deadlock Detection
//!
//! Replays a sequence of request/assignment edges and reports the first prefix at
//! which a set of agents can no longer make progress.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Edge`, `EdgeKind`, `AllocationGraph` |
//! | [`application`] | Application | `detect_deadlock`, `IncrementalDetector`, `Detection` |
//!
//! ## Edge Format
//!
//! - `A3 -> R4`: agent `A3` requests resource `R4` (the agent waits on the resource).
//! - `A3 <- R4`: resource `R4` is assigned to agent `A3` (the resource waits on the agent).
//!
//! Agent and resource names live in separate name spaces, so `1 -> 1` is a valid edge.

pub mod domain;
pub mod application;

pub use application::*;
pub use domain::*;
