// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides the simulator's domain types.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and synchronization primitives; no task spawning

pub mod agent;
pub mod board;
pub mod config;
pub mod events;
pub mod fairness;
pub mod lock_order;
pub mod resource;
pub mod service;
pub mod strategy;
