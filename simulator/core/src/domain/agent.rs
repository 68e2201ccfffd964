// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agents
//!
//! Identity, strategy tag and observable activity of the agents seated around the
//! ring. Agent `i` sits between resource `i` (its left) and resource `(i + 1) mod N`
//! (its right).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::resource::ResourceId;

/// Unique identifier for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimulationId(pub Uuid);

impl SimulationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SimulationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Seat index of an agent in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub usize);

impl AgentId {
    pub fn index(self) -> usize {
        self.0
    }

    /// Resource on the agent's left (same index).
    pub fn left(self, population: usize) -> ResourceId {
        ResourceId(self.0 % population)
    }

    /// Resource on the agent's right (next index, wrapping).
    pub fn right(self, population: usize) -> ResourceId {
        ResourceId((self.0 + 1) % population)
    }

    /// The two agents sharing a resource with this one: `(left, right)`.
    pub fn neighbors(self, population: usize) -> (AgentId, AgentId) {
        (
            AgentId((self.0 + population - 1) % population),
            AgentId((self.0 + 1) % population),
        )
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Acquisition protocol an agent follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Balanced,
    Ordered,
    Voracious,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Balanced, Strategy::Ordered, Strategy::Voracious];

    /// Single-letter marker used in reports.
    pub fn marker(self) -> char {
        match self {
            Strategy::Balanced => 'B',
            Strategy::Ordered => 'O',
            Strategy::Voracious => 'V',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Balanced => "balanced",
            Strategy::Ordered => "ordered",
            Strategy::Voracious => "voracious",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable activity of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    #[default]
    Idle,
    Active,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Idle => f.write_str("IDLE"),
            Activity::Active => f.write_str("ACTIVE"),
        }
    }
}

/// An agent seated in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub strategy: Strategy,
}

impl Agent {
    pub fn new(id: AgentId, strategy: Strategy) -> Self {
        Self { id, strategy }
    }
}
