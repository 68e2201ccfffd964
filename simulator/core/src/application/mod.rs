// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: the simulation context and the tasks that drive it.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Spawns and coordinates agent workers and the tracker

pub mod agent_worker;
pub mod lifecycle;
pub mod simulation;
pub mod tracker;

pub use agent_worker::{AgentWorker, CycleOutcome};
pub use lifecycle::{AgentSummary, LifecycleController, ResourceSummary, RunSummary};
pub use simulation::{AgentStats, Sample, Simulation};
pub use tracker::{AgentRow, AuditSummary, Finding, NullSink, Report, ReportSink, StateTracker};
