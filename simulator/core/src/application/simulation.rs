// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Simulation Context
//!
//! Owns all state of one run: the ring, the ledger, the board, per-agent counters,
//! the event bus and the live edge trace. Agent workers, the tracker and the
//! lifecycle controller share it through `Arc<Simulation>`; several simulations can
//! run side by side in one process.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::domain::agent::{Agent, AgentId, SimulationId, Strategy};
use crate::domain::board::{Snapshot, StateBoard};
use crate::domain::config::{ConfigError, SimulationSpec};
use crate::domain::events::SimulationEvent;
use crate::domain::fairness::FairnessLedger;
use crate::domain::lock_order::with_locks;
use crate::domain::resource::{ResourceId, ResourceRing};
use crate::domain::service::ServiceTimer;
use crate::domain::strategy::AcquisitionObserver;
use crate::infrastructure::edge_trace::EdgeTrace;
use crate::infrastructure::event_bus::EventBus;

/// Non-service outcomes of an agent's cycles.
#[derive(Debug, Default)]
struct AgentCounters {
    vetoes: AtomicU64,
    timeouts: AtomicU64,
    unavailable: AtomicU64,
}

/// Point-in-time copy of one agent's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentStats {
    pub services: u64,
    pub vetoes: u64,
    pub timeouts: u64,
    pub unavailable: u64,
}

/// Ledger counts and board state read under one critical section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub counts: Vec<u64>,
    pub snapshot: Snapshot,
}

pub struct Simulation {
    id: SimulationId,
    spec: SimulationSpec,
    agents: Vec<Agent>,
    ring: ResourceRing,
    ledger: FairnessLedger,
    board: StateBoard,
    counters: Vec<AgentCounters>,
    timer: ServiceTimer,
    events: EventBus,
    trace: EdgeTrace,
    cancel: CancellationToken,
}

impl Simulation {
    pub fn new(spec: SimulationSpec) -> Result<Self, ConfigError> {
        Self::with_event_bus(spec, EventBus::with_default_capacity())
    }

    /// Builds a simulation that publishes on an existing bus.
    pub fn with_event_bus(spec: SimulationSpec, events: EventBus) -> Result<Self, ConfigError> {
        spec.validate()?;
        let seating = spec.seating();
        Self::seated(spec, seating, events)
    }

    /// Builds a simulation with an explicit strategy per seat.
    pub fn with_seating(spec: SimulationSpec, seating: Vec<Strategy>) -> Result<Self, ConfigError> {
        spec.validate()?;
        Self::seated(spec, seating, EventBus::with_default_capacity())
    }

    fn seated(
        spec: SimulationSpec,
        seating: Vec<Strategy>,
        events: EventBus,
    ) -> Result<Self, ConfigError> {
        let n = spec.population;
        if seating.len() != n {
            return Err(ConfigError::StrategyCountMismatch {
                balanced: count(&seating, Strategy::Balanced),
                ordered: count(&seating, Strategy::Ordered),
                voracious: count(&seating, Strategy::Voracious),
                total: seating.len(),
                population: n,
            });
        }

        let timer = ServiceTimer::new(&spec.service)?;
        let agents = seating
            .into_iter()
            .enumerate()
            .map(|(i, strategy)| Agent::new(AgentId(i), strategy))
            .collect();

        Ok(Self {
            id: SimulationId::new(),
            agents,
            ring: ResourceRing::new(n),
            ledger: FairnessLedger::new(n, spec.fairness.threshold),
            board: StateBoard::new(n),
            counters: (0..n).map(|_| AgentCounters::default()).collect(),
            timer,
            events,
            trace: EdgeTrace::new(n),
            cancel: CancellationToken::new(),
            spec,
        })
    }

    pub fn id(&self) -> SimulationId {
        self.id
    }

    pub fn spec(&self) -> &SimulationSpec {
        &self.spec
    }

    pub fn population(&self) -> usize {
        self.agents.len()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Agent {
        self.agents[id.index()]
    }

    pub fn ring(&self) -> &ResourceRing {
        &self.ring
    }

    pub fn ledger(&self) -> &FairnessLedger {
        &self.ledger
    }

    pub fn board(&self) -> &StateBoard {
        &self.board
    }

    pub fn timer(&self) -> &ServiceTimer {
        &self.timer
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn edge_trace(&self) -> &EdgeTrace {
        &self.trace
    }

    /// Token cancelled when the simulation is asked to stop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.board.snapshot()
    }

    /// Reads ledger and board together.
    pub fn sample(&self) -> Sample {
        with_locks(&self.ledger, &self.board, |counts, state| Sample {
            counts: counts.to_vec(),
            snapshot: Snapshot::from_state(state),
        })
    }

    pub fn stats(&self, agent: AgentId) -> AgentStats {
        let counters = &self.counters[agent.index()];
        AgentStats {
            services: self.ledger.count(agent),
            vetoes: counters.vetoes.load(Ordering::Relaxed),
            timeouts: counters.timeouts.load(Ordering::Relaxed),
            unavailable: counters.unavailable.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_veto(&self, agent: AgentId) {
        self.counters[agent.index()].vetoes.fetch_add(1, Ordering::Relaxed);
        self.events.publish(SimulationEvent::ServiceVetoed {
            simulation_id: self.id,
            agent,
            vetoed_at: Utc::now(),
        });
    }

    pub(crate) fn record_timeout(&self, agent: AgentId) {
        self.counters[agent.index()].timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unavailable(&self, agent: AgentId) {
        self.counters[agent.index()]
            .unavailable
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn publish(&self, event: SimulationEvent) {
        self.events.publish(event);
    }
}

impl AcquisitionObserver for Simulation {
    fn on_requested(&self, agent: AgentId, resource: ResourceId) {
        trace!(simulation_id = %self.id, %agent, %resource, "Waiting for resource");
        self.trace.on_requested(agent, resource);
        self.publish(SimulationEvent::ResourceRequested {
            simulation_id: self.id,
            agent,
            resource,
            requested_at: Utc::now(),
        });
    }

    fn on_acquired(&self, agent: AgentId, resource: ResourceId) {
        self.trace.on_acquired(agent, resource);
        self.publish(SimulationEvent::ResourceAcquired {
            simulation_id: self.id,
            agent,
            resource,
            acquired_at: Utc::now(),
        });
    }

    fn on_abandoned(&self, agent: AgentId, resource: ResourceId) {
        trace!(simulation_id = %self.id, %agent, %resource, "Gave up waiting for resource");
        self.trace.on_abandoned(agent, resource);
        self.publish(SimulationEvent::RequestAbandoned {
            simulation_id: self.id,
            agent,
            resource,
            abandoned_at: Utc::now(),
        });
    }

    fn on_released(&self, agent: AgentId, resource: ResourceId) {
        self.trace.on_released(agent, resource);
        self.publish(SimulationEvent::ResourceReleased {
            simulation_id: self.id,
            agent,
            resource,
            released_at: Utc::now(),
        });
    }
}

fn count(seating: &[Strategy], strategy: Strategy) -> usize {
    seating.iter().filter(|s| **s == strategy).count()
}
