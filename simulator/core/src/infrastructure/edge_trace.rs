// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Live wait-for graph built from acquisition callbacks.
//!
//! Holds one assignment edge per locked resource and one request edge per bounded
//! wait in progress, in the edge format understood by `contend_detector`. The trace
//! lock is a leaf: nothing else is locked while it is held.

use contend_detector::{Detection, Edge, IncrementalDetector};
use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::domain::agent::AgentId;
use crate::domain::resource::ResourceId;
use crate::domain::strategy::AcquisitionObserver;

#[derive(Debug)]
struct TraceState {
    holders: Vec<Option<AgentId>>,
    waiting: BTreeMap<AgentId, ResourceId>,
}

#[derive(Debug)]
pub struct EdgeTrace {
    state: Mutex<TraceState>,
}

impl EdgeTrace {
    pub fn new(population: usize) -> Self {
        Self {
            state: Mutex::new(TraceState {
                holders: vec![None; population],
                waiting: BTreeMap::new(),
            }),
        }
    }

    /// Assignments first (by resource), then requests (by agent).
    pub fn current_edges(&self) -> Vec<Edge> {
        let state = self.state.lock();
        let assignments = state.holders.iter().enumerate().filter_map(|(r, holder)| {
            holder.map(|agent| Edge::assignment(agent.to_string(), ResourceId(r).to_string()))
        });
        let requests = state
            .waiting
            .iter()
            .map(|(agent, resource)| Edge::request(agent.to_string(), resource.to_string()));
        assignments.chain(requests).collect()
    }

    /// Current edges rendered one per line.
    pub fn render(&self) -> Vec<String> {
        self.current_edges().iter().map(ToString::to_string).collect()
    }

    /// Runs the deadlock detector over the current graph.
    pub fn detect(&self) -> Detection {
        let mut detector = IncrementalDetector::new();
        for (index, edge) in self.current_edges().iter().enumerate() {
            if let Some(agents) = detector.push(edge) {
                return Detection::Deadlock {
                    agents,
                    edge_index: index,
                };
            }
        }
        Detection::Clear
    }

    pub fn holder(&self, resource: ResourceId) -> Option<AgentId> {
        self.state.lock().holders[resource.index()]
    }
}

impl AcquisitionObserver for EdgeTrace {
    fn on_requested(&self, agent: AgentId, resource: ResourceId) {
        self.state.lock().waiting.insert(agent, resource);
    }

    fn on_acquired(&self, agent: AgentId, resource: ResourceId) {
        let mut state = self.state.lock();
        if state.waiting.get(&agent) == Some(&resource) {
            state.waiting.remove(&agent);
        }
        state.holders[resource.index()] = Some(agent);
    }

    fn on_abandoned(&self, agent: AgentId, resource: ResourceId) {
        let mut state = self.state.lock();
        if state.waiting.get(&agent) == Some(&resource) {
            state.waiting.remove(&agent);
        }
    }

    fn on_released(&self, agent: AgentId, resource: ResourceId) {
        let mut state = self.state.lock();
        let slot = &mut state.holders[resource.index()];
        if *slot == Some(agent) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_follow_callbacks() {
        let trace = EdgeTrace::new(3);
        trace.on_acquired(AgentId(0), ResourceId(0));
        trace.on_requested(AgentId(0), ResourceId(1));
        assert_eq!(trace.render(), vec!["A0 <- R0", "A0 -> R1"]);

        trace.on_acquired(AgentId(0), ResourceId(1));
        assert_eq!(trace.render(), vec!["A0 <- R0", "A0 <- R1"]);

        trace.on_released(AgentId(0), ResourceId(1));
        trace.on_released(AgentId(0), ResourceId(0));
        assert!(trace.current_edges().is_empty());
    }

    #[test]
    fn test_abandoned_request_disappears() {
        let trace = EdgeTrace::new(2);
        trace.on_requested(AgentId(1), ResourceId(0));
        trace.on_abandoned(AgentId(1), ResourceId(0));
        assert!(trace.render().is_empty());
        assert_eq!(trace.detect(), Detection::Clear);
    }

    #[test]
    fn test_circular_wait_is_detected() {
        let trace = EdgeTrace::new(3);
        for agent in 0..3 {
            trace.on_acquired(AgentId(agent), ResourceId(agent));
        }
        for agent in 0..3 {
            trace.on_requested(AgentId(agent), ResourceId((agent + 1) % 3));
        }

        let detection = trace.detect();
        assert!(detection.is_deadlock());
        assert_eq!(detection.agents(), ["A0", "A1", "A2"]);
        assert_eq!(detection.edge_index(), Some(5));
        assert_eq!(trace.holder(ResourceId(2)), Some(AgentId(2)));
    }
}
