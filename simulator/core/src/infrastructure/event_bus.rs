// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - Pub/Sub for Simulation Events
//
// In-memory fan-out over a tokio broadcast channel. Publishing never blocks an
// agent: with no subscribers the event is simply dropped, and slow subscribers
// lose the oldest events and are told how many.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::domain::agent::{AgentId, SimulationId};
use crate::domain::events::SimulationEvent;

/// Event bus for publishing and subscribing to simulation events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<SimulationEvent>>,
}

impl EventBus {
    /// Capacity is the number of events buffered per subscriber before the oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1024)
    pub fn with_default_capacity() -> Self {
        Self::new(1024)
    }

    pub fn publish(&self, event: SimulationEvent) {
        trace!(?event, "Publishing simulation event");
        // send() only fails when nobody is subscribed.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of one agent in one simulation.
    pub fn subscribe_agent(&self, simulation_id: SimulationId, agent: AgentId) -> AgentEventReceiver {
        AgentEventReceiver {
            inner: self.subscribe(),
            simulation_id,
            agent,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for all simulation events
pub struct EventReceiver {
    receiver: broadcast::Receiver<SimulationEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<SimulationEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<SimulationEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one agent of one simulation
pub struct AgentEventReceiver {
    inner: EventReceiver,
    simulation_id: SimulationId,
    agent: AgentId,
}

impl AgentEventReceiver {
    pub async fn recv(&mut self) -> Result<SimulationEvent, EventBusError> {
        loop {
            let event = self.inner.recv().await?;
            if event.simulation_id() == self.simulation_id && event.agent() == Some(self.agent) {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
