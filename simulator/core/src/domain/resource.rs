// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resource Ring
//!
//! `N` exclusively-lockable slots arranged in a circle. Ownership is a
//! [`ResourceGuard`]: the guard exists exactly as long as the slot is held, and
//! releasing consumes it, so a resource cannot be released twice or by an agent
//! that does not hold it.
//!
//! Every slot also carries instrumented counters (current holders, peak holders,
//! recorded owner). They are not used for exclusion, which is the mutex's job; they
//! let tests and the release path verify it.
//!
//! ## Invariant violations
//!
//! A release that finds a holder count other than one, or an owner other than the
//! releasing agent, panics in debug builds and is logged at `error` in release builds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, trace};

use crate::domain::agent::AgentId;

const NO_OWNER: usize = usize::MAX;

/// Index of a resource in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub usize);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Observable state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    #[default]
    Free,
    Held,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceState::Free => f.write_str("FREE"),
            ResourceState::Held => f.write_str("HELD"),
        }
    }
}

#[derive(Debug)]
struct Slot {
    id: ResourceId,
    lock: Arc<Mutex<()>>,
    holders: AtomicUsize,
    peak_holders: AtomicUsize,
    owner: AtomicUsize,
}

impl Slot {
    fn new(id: ResourceId) -> Self {
        Self {
            id,
            lock: Arc::new(Mutex::new(())),
            holders: AtomicUsize::new(0),
            peak_holders: AtomicUsize::new(0),
            owner: AtomicUsize::new(NO_OWNER),
        }
    }
}

/// Proof that `agent` holds `resource`. Dropping or releasing it frees the slot.
#[derive(Debug)]
#[must_use = "dropping a ResourceGuard releases the resource immediately"]
pub struct ResourceGuard {
    slot: Arc<Slot>,
    agent: AgentId,
    _permit: OwnedMutexGuard<()>,
}

impl ResourceGuard {
    fn new(slot: Arc<Slot>, agent: AgentId, permit: OwnedMutexGuard<()>) -> Self {
        let previous = slot.holders.fetch_add(1, Ordering::AcqRel);
        slot.peak_holders.fetch_max(previous + 1, Ordering::AcqRel);
        if previous != 0 {
            invariant_violation(format!(
                "{} acquired by {} while {} other holder(s) were recorded",
                slot.id, agent, previous
            ));
        }
        slot.owner.store(agent.index(), Ordering::Release);
        trace!(resource = %slot.id, %agent, "Resource acquired");
        Self {
            slot,
            agent,
            _permit: permit,
        }
    }

    pub fn resource(&self) -> ResourceId {
        self.slot.id
    }

    pub fn holder(&self) -> AgentId {
        self.agent
    }

    /// Releases the resource.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        let owner = self.slot.owner.swap(NO_OWNER, Ordering::AcqRel);
        if owner != self.agent.index() {
            invariant_violation(format!(
                "{} released by {} but recorded owner was {}",
                self.slot.id,
                self.agent,
                if owner == NO_OWNER { "nobody".to_string() } else { format!("A{owner}") }
            ));
        }
        let previous = self.slot.holders.fetch_sub(1, Ordering::AcqRel);
        if previous != 1 {
            invariant_violation(format!(
                "{} released by {} with {} recorded holder(s)",
                self.slot.id, self.agent, previous
            ));
        }
        trace!(resource = %self.slot.id, agent = %self.agent, "Resource released");
        // `_permit` unlocks the slot after this body returns.
    }
}

/// The circular arrangement of resources.
#[derive(Debug)]
pub struct ResourceRing {
    slots: Vec<Arc<Slot>>,
}

impl ResourceRing {
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|i| Arc::new(Slot::new(ResourceId(i)))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Non-blocking acquire.
    pub fn try_acquire(&self, resource: ResourceId, agent: AgentId) -> Option<ResourceGuard> {
        let slot = self.slot(resource);
        let permit = Arc::clone(&slot.lock).try_lock_owned().ok()?;
        Some(ResourceGuard::new(Arc::clone(slot), agent, permit))
    }

    /// Waits at most `wait` for the resource; `None` on timeout.
    pub async fn try_acquire_within(
        &self,
        resource: ResourceId,
        agent: AgentId,
        wait: Duration,
    ) -> Option<ResourceGuard> {
        let slot = self.slot(resource);
        let permit = tokio::time::timeout(wait, Arc::clone(&slot.lock).lock_owned())
            .await
            .ok()?;
        Some(ResourceGuard::new(Arc::clone(slot), agent, permit))
    }

    /// Current owner according to the instrumented counters.
    pub fn holder(&self, resource: ResourceId) -> Option<AgentId> {
        match self.slot(resource).owner.load(Ordering::Acquire) {
            NO_OWNER => None,
            index => Some(AgentId(index)),
        }
    }

    pub fn holder_count(&self, resource: ResourceId) -> usize {
        self.slot(resource).holders.load(Ordering::Acquire)
    }

    /// Highest number of simultaneous holders ever recorded for the slot.
    pub fn peak_holders(&self, resource: ResourceId) -> usize {
        self.slot(resource).peak_holders.load(Ordering::Acquire)
    }

    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.slots.iter().map(|s| s.id)
    }

    fn slot(&self, resource: ResourceId) -> &Arc<Slot> {
        &self.slots[resource.index() % self.slots.len()]
    }
}

fn invariant_violation(message: String) {
    if cfg!(debug_assertions) {
        panic!("resource invariant violated: {message}");
    }
    error!("Resource invariant violated: {}", message);
}
