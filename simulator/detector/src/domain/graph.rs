// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Allocation Graph
//!
//! Wait-for graph over agents and resources. Every edge is stored as "`waiter` waits
//! on `holder`": a request makes the agent wait on the resource, an assignment makes
//! the resource wait on the agent that holds it.
//!
//! A node can make progress when nothing it waits on is blocked. Peeling nodes with
//! zero out-degree (Kahn's algorithm, run backwards along the wait edges) leaves exactly
//! the nodes on a cycle or blocked behind one.

use std::collections::HashMap;

use super::edge::{Edge, EdgeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NodeKind {
    Agent,
    Resource,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    name: String,
    /// Nodes waiting on this node.
    waiters: Vec<usize>,
    /// Number of nodes this node waits on.
    out_degree: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AllocationGraph {
    nodes: Vec<Node>,
    index: HashMap<(NodeKind, String), usize>,
}

impl AllocationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_edge(&mut self, edge: &Edge) {
        let agent = self.intern(NodeKind::Agent, &edge.agent);
        let resource = self.intern(NodeKind::Resource, &edge.resource);

        let (waiter, holder) = match edge.kind {
            EdgeKind::Request => (agent, resource),
            EdgeKind::Assignment => (resource, agent),
        };
        self.nodes[holder].waiters.push(waiter);
        self.nodes[waiter].out_degree += 1;
    }

    /// Agents that can never be unblocked, in order of first appearance.
    pub fn blocked_agents(&self) -> Vec<String> {
        let mut remaining: Vec<usize> = self.nodes.iter().map(|n| n.out_degree).collect();
        let mut ready: Vec<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(i, _)| i)
            .collect();

        while let Some(node) = ready.pop() {
            for &waiter in &self.nodes[node].waiters {
                remaining[waiter] -= 1;
                if remaining[waiter] == 0 {
                    ready.push(waiter);
                }
            }
        }

        self.nodes
            .iter()
            .zip(remaining)
            .filter(|(node, degree)| *degree > 0 && node.kind == NodeKind::Agent)
            .map(|(node, _)| node.name.clone())
            .collect()
    }

    fn intern(&mut self, kind: NodeKind, name: &str) -> usize {
        if let Some(&id) = self.index.get(&(kind, name.to_string())) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            name: name.to_string(),
            waiters: Vec::new(),
            out_degree: 0,
        });
        self.index.insert((kind, name.to_string()), id);
        id
    }
}
