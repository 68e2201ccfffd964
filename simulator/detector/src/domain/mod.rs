// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Detector Domain Layer
//!
//! Pure graph types. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`edge`] | `Edge`, `EdgeKind`, `EdgeParseError` |
//! | [`graph`] | `AllocationGraph` |

pub mod edge;
pub mod graph;

pub use edge::*;
pub use graph::*;
