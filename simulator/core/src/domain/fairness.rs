// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Fairness Ledger
//!
//! Per-agent count of completed services plus the veto rule that keeps neighbors
//! within a bounded distance of each other.
//!
//! An agent that has already acquired both resources asks [`FairnessLedger::should_yield`]
//! before servicing. It must yield when its count leads either neighbor by at least the
//! threshold `T`. Since a voracious agent is credited two services at once, a lead can
//! reach `T + 1` but never more.
//!
//! Counts only ever grow; the ledger exposes no way to decrement them.

use parking_lot::Mutex;

use crate::domain::agent::AgentId;
use crate::domain::lock_order::{LockLevel, Locked};

/// Default maximum lead before an agent is vetoed.
pub const DEFAULT_FAIRNESS_THRESHOLD: u64 = 3;

#[derive(Debug)]
pub struct FairnessLedger {
    counts: Mutex<Vec<u64>>,
    threshold: u64,
}

impl FairnessLedger {
    pub fn new(population: usize, threshold: u64) -> Self {
        Self {
            counts: Mutex::new(vec![0; population]),
            threshold,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn population(&self) -> usize {
        self.locked().len()
    }

    /// `true` when `agent` leads either neighbor by at least the threshold.
    pub fn should_yield(&self, agent: AgentId) -> bool {
        let counts = self.locked();
        let population = counts.len();
        let (left, right) = agent.neighbors(population);
        let own = counts[agent.index()];

        own.saturating_sub(counts[left.index()]) >= self.threshold
            || own.saturating_sub(counts[right.index()]) >= self.threshold
    }

    /// Credits one service, or two when `doubled`.
    pub fn record_completion(&self, agent: AgentId, doubled: bool) -> u64 {
        let mut counts = self.locked();
        let slot = &mut counts[agent.index()];
        *slot += if doubled { 2 } else { 1 };
        *slot
    }

    pub fn count(&self, agent: AgentId) -> u64 {
        self.locked()[agent.index()]
    }

    pub fn counts(&self) -> Vec<u64> {
        self.locked().clone()
    }

    /// Largest lead any agent currently holds over one of its neighbors.
    pub fn max_neighbor_lead(&self) -> u64 {
        max_neighbor_lead(&self.locked())
    }

    pub(crate) fn locked(&self) -> Locked<'_, Vec<u64>> {
        Locked::new(LockLevel::Ledger, &self.counts)
    }
}

/// Largest `counts[i] - counts[neighbor]` over the ring.
pub fn max_neighbor_lead(counts: &[u64]) -> u64 {
    let population = counts.len();
    (0..population)
        .map(|i| {
            let (left, right) = AgentId(i).neighbors(population);
            counts[i]
                .saturating_sub(counts[left.index()])
                .max(counts[i].saturating_sub(counts[right.index()]))
        })
        .max()
        .unwrap_or(0)
}
