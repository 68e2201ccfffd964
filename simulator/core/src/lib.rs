// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `contend-core`: Resource Contention Simulator
//!
//! A fixed ring of agents contends for the exclusively-lockable resources between
//! them. Each agent follows one acquisition strategy, asks a fairness ledger for
//! permission before servicing, and reports its observable state to a board that a
//! tracker samples on a fixed cadence.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | ring, agents, strategies, ledger, board, config, events |
//! | [`application`] | Application | `Simulation`, agent worker, tracker, lifecycle |
//! | [`infrastructure`] | Infrastructure | event bus, report writers, live edge trace |
//!
//! ## Lock Domains
//!
//! Resource locks, the fairness ledger lock and the state board lock are independent.
//! They may only be nested in the order `Resource < Ledger < State`; see
//! [`domain::lock_order`].

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
