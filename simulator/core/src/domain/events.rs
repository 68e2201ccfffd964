// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::{AgentId, SimulationId, Strategy};
use crate::domain::resource::ResourceId;

/// Events published while a simulation runs.
///
/// Resource events mirror the acquisition callbacks one-to-one; service events
/// follow the agent cycle. Subscribers that fall behind lose the oldest events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationEvent {
    SimulationStarted {
        simulation_id: SimulationId,
        population: usize,
        seating: Vec<Strategy>,
        started_at: DateTime<Utc>,
    },
    ResourceRequested {
        simulation_id: SimulationId,
        agent: AgentId,
        resource: ResourceId,
        requested_at: DateTime<Utc>,
    },
    ResourceAcquired {
        simulation_id: SimulationId,
        agent: AgentId,
        resource: ResourceId,
        acquired_at: DateTime<Utc>,
    },
    RequestAbandoned {
        simulation_id: SimulationId,
        agent: AgentId,
        resource: ResourceId,
        abandoned_at: DateTime<Utc>,
    },
    ResourceReleased {
        simulation_id: SimulationId,
        agent: AgentId,
        resource: ResourceId,
        released_at: DateTime<Utc>,
    },
    ServiceStarted {
        simulation_id: SimulationId,
        agent: AgentId,
        duration_ms: u64,
        started_at: DateTime<Utc>,
    },
    ServiceCompleted {
        simulation_id: SimulationId,
        agent: AgentId,
        services_completed: u64,
        completed_at: DateTime<Utc>,
    },
    ServiceVetoed {
        simulation_id: SimulationId,
        agent: AgentId,
        vetoed_at: DateTime<Utc>,
    },
    SimulationStopped {
        simulation_id: SimulationId,
        total_services: u64,
        stopped_at: DateTime<Utc>,
    },
}

impl SimulationEvent {
    pub fn simulation_id(&self) -> SimulationId {
        match self {
            Self::SimulationStarted { simulation_id, .. }
            | Self::ResourceRequested { simulation_id, .. }
            | Self::ResourceAcquired { simulation_id, .. }
            | Self::RequestAbandoned { simulation_id, .. }
            | Self::ResourceReleased { simulation_id, .. }
            | Self::ServiceStarted { simulation_id, .. }
            | Self::ServiceCompleted { simulation_id, .. }
            | Self::ServiceVetoed { simulation_id, .. }
            | Self::SimulationStopped { simulation_id, .. } => *simulation_id,
        }
    }

    /// The agent the event concerns, if any.
    pub fn agent(&self) -> Option<AgentId> {
        match self {
            Self::ResourceRequested { agent, .. }
            | Self::ResourceAcquired { agent, .. }
            | Self::RequestAbandoned { agent, .. }
            | Self::ResourceReleased { agent, .. }
            | Self::ServiceStarted { agent, .. }
            | Self::ServiceCompleted { agent, .. }
            | Self::ServiceVetoed { agent, .. } => Some(*agent),
            Self::SimulationStarted { .. } | Self::SimulationStopped { .. } => None,
        }
    }
}
