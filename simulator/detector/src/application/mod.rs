// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deadlock detection use cases.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Replays edge sequences against an [`AllocationGraph`] and reports the
//!   first prefix that deadlocks

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::{AllocationGraph, Edge, EdgeParseError};

/// Outcome of replaying an edge sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Detection {
    /// Adding the edge at `edge_index` (zero based) left `agents` permanently blocked.
    Deadlock {
        agents: Vec<String>,
        edge_index: usize,
    },
    /// No prefix of the sequence deadlocks.
    Clear,
}

impl Detection {
    pub fn is_deadlock(&self) -> bool {
        matches!(self, Detection::Deadlock { .. })
    }

    /// Index of the triggering edge, `None` when clear.
    pub fn edge_index(&self) -> Option<usize> {
        match self {
            Detection::Deadlock { edge_index, .. } => Some(*edge_index),
            Detection::Clear => None,
        }
    }

    pub fn agents(&self) -> &[String] {
        match self {
            Detection::Deadlock { agents, .. } => agents,
            Detection::Clear => &[],
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("edge {index} ('{edge}') is malformed: {reason}")]
    MalformedEdge {
        index: usize,
        edge: String,
        reason: EdgeParseError,
    },
}

/// Feeds edges one at a time and re-evaluates the graph after each.
#[derive(Debug, Default)]
pub struct IncrementalDetector {
    graph: AllocationGraph,
    edges_seen: usize,
}

impl IncrementalDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `edge`; returns the blocked agents if the graph is now deadlocked.
    pub fn push(&mut self, edge: &Edge) -> Option<Vec<String>> {
        self.graph.add_edge(edge);
        self.edges_seen += 1;
        let blocked = self.graph.blocked_agents();
        (!blocked.is_empty()).then_some(blocked)
    }

    pub fn edges_seen(&self) -> usize {
        self.edges_seen
    }
}

/// Replays `edges` in order and stops at the first one that closes a deadlock.
pub fn detect_deadlock<S: AsRef<str>>(edges: &[S]) -> Result<Detection, DetectorError> {
    let mut detector = IncrementalDetector::new();

    for (index, raw) in edges.iter().enumerate() {
        let raw = raw.as_ref();
        let edge: Edge = raw.parse().map_err(|reason| DetectorError::MalformedEdge {
            index,
            edge: raw.to_string(),
            reason,
        })?;

        if let Some(agents) = detector.push(&edge) {
            debug!(edge_index = index, ?agents, "Deadlock detected");
            return Ok(Detection::Deadlock {
                agents,
                edge_index: index,
            });
        }
    }

    Ok(Detection::Clear)
}
