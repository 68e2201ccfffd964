// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # State Board and Snapshots
//!
//! Observable activity/resource flags used for reporting. Resource locks decide who
//! *owns* a resource; the board records what observers are allowed to *see*.
//!
//! An agent's activity and the flags of its two resources change together in one
//! critical section ([`StateBoard::begin_service`] / [`StateBoard::end_service`]), so
//! every [`Snapshot`] satisfies:
//!
//! - an `Active` agent has both adjacent resources `Held`;
//! - every `Held` resource has exactly one `Active` adjacent agent.

use serde::{Deserialize, Serialize};
use parking_lot::Mutex;
use std::fmt;

use crate::domain::agent::{Activity, AgentId};
use crate::domain::lock_order::{LockLevel, Locked};
use crate::domain::resource::{ResourceId, ResourceState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    pub agents: Vec<Activity>,
    pub resources: Vec<ResourceState>,
}

#[derive(Debug)]
pub struct StateBoard {
    state: Mutex<BoardState>,
}

impl StateBoard {
    pub fn new(population: usize) -> Self {
        Self {
            state: Mutex::new(BoardState {
                agents: vec![Activity::Idle; population],
                resources: vec![ResourceState::Free; population],
            }),
        }
    }

    /// Marks `agent` active and both of its resources held.
    pub fn begin_service(&self, agent: AgentId) {
        self.transition(agent, Activity::Active, ResourceState::Held);
    }

    /// Marks `agent` idle and both of its resources free.
    pub fn end_service(&self, agent: AgentId) {
        self.transition(agent, Activity::Idle, ResourceState::Free);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_state(&self.locked())
    }

    pub(crate) fn locked(&self) -> Locked<'_, BoardState> {
        Locked::new(LockLevel::State, &self.state)
    }

    fn transition(&self, agent: AgentId, activity: Activity, resources: ResourceState) {
        let mut state = self.locked();
        let population = state.agents.len();
        state.agents[agent.index()] = activity;
        state.resources[agent.left(population).index()] = resources;
        state.resources[agent.right(population).index()] = resources;
    }
}

/// Immutable point-in-time copy of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    agents: Vec<Activity>,
    resources: Vec<ResourceState>,
}

/// A way a snapshot can contradict the board invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotViolation {
    /// Active agent with a free adjacent resource.
    ActiveWithFreeResource { agent: AgentId, resource: ResourceId },
    /// Held resource with no active adjacent agent.
    UnattributedHold { resource: ResourceId },
    /// Both agents sharing a resource are active.
    SharedHold { resource: ResourceId },
}

impl fmt::Display for SnapshotViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActiveWithFreeResource { agent, resource } => {
                write!(f, "{agent} is active but {resource} is free")
            }
            Self::UnattributedHold { resource } => {
                write!(f, "{resource} is held by no active agent")
            }
            Self::SharedHold { resource } => {
                write!(f, "{resource} is held by two active agents")
            }
        }
    }
}

impl Snapshot {
    pub fn from_state(state: &BoardState) -> Self {
        Self {
            agents: state.agents.clone(),
            resources: state.resources.clone(),
        }
    }

    pub fn population(&self) -> usize {
        self.agents.len()
    }

    pub fn activity(&self, agent: AgentId) -> Activity {
        self.agents[agent.index()]
    }

    pub fn resource(&self, resource: ResourceId) -> ResourceState {
        self.resources[resource.index()]
    }

    pub fn agents(&self) -> &[Activity] {
        &self.agents
    }

    pub fn resources(&self) -> &[ResourceState] {
        &self.resources
    }

    pub fn active_agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents
            .iter()
            .enumerate()
            .filter(|(_, a)| **a == Activity::Active)
            .map(|(i, _)| AgentId(i))
    }

    pub fn violations(&self) -> Vec<SnapshotViolation> {
        let n = self.population();
        let mut violations = Vec::new();

        for agent in self.active_agents() {
            for resource in [agent.left(n), agent.right(n)] {
                if self.resource(resource) == ResourceState::Free {
                    violations.push(SnapshotViolation::ActiveWithFreeResource { agent, resource });
                }
            }
        }

        for (index, state) in self.resources.iter().enumerate() {
            // Resource r sits between agent r-1 (its right) and agent r (its left).
            let left_user = AgentId(index);
            let right_user = AgentId((index + n - 1) % n);
            let active_users = [left_user, right_user]
                .iter()
                .filter(|a| self.activity(**a) == Activity::Active)
                .count();
            let resource = ResourceId(index);
            match (state, active_users) {
                (ResourceState::Held, 0) => {
                    violations.push(SnapshotViolation::UnattributedHold { resource })
                }
                (_, 2) if left_user != right_user => {
                    violations.push(SnapshotViolation::SharedHold { resource })
                }
                _ => {}
            }
        }

        violations
    }

    pub fn is_consistent(&self) -> bool {
        self.violations().is_empty()
    }
}
