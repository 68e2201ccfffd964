// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Lock Ordering
//!
//! The simulator has three locking domains, acquired only in ascending order:
//!
//! 1. **Resource**: per-slot async mutexes in the [`ResourceRing`](super::resource::ResourceRing),
//!    held across awaits while an agent waits and services.
//! 2. **Ledger**: the [`FairnessLedger`](super::fairness::FairnessLedger) mutex.
//! 3. **State**: the [`StateBoard`](super::board::StateBoard) mutex.
//!
//! Ledger and state are synchronous `parking_lot` mutexes whose guards are `!Send`, so
//! a spawned task cannot hold either one across a resource wait: that direction of the
//! rule is checked by the compiler. The ledger/state direction is checked at runtime by
//! [`LockOrderGuard`], a per-thread level tracker that panics in debug builds when a
//! lock is taken at or below a level the thread already holds.

use parking_lot::MutexGuard;
use std::cell::Cell;
use std::fmt;
use std::ops::{Deref, DerefMut};

use super::board::{BoardState, StateBoard};
use super::fairness::FairnessLedger;

thread_local! {
    static HELD_LEVEL: Cell<u8> = const { Cell::new(0) };
}

/// Synchronous lock levels, in acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LockLevel {
    Ledger = 1,
    State = 2,
}

impl LockLevel {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ledger => "ledger",
            Self::State => "state",
        }
    }
}

impl fmt::Display for LockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}

/// Records that the current thread holds a lock at `level` until dropped.
///
/// Create it immediately before locking and keep it alive as long as the mutex guard.
#[derive(Debug)]
#[must_use]
pub struct LockOrderGuard {
    previous: u8,
}

impl LockOrderGuard {
    /// # Panics
    ///
    /// Panics in debug builds if the thread already holds a lock at `level` or above.
    pub fn acquire(level: LockLevel) -> Self {
        let level = level as u8;
        let previous = HELD_LEVEL.with(Cell::get);

        #[cfg(debug_assertions)]
        assert!(
            level > previous,
            "Lock ordering violation: acquiring level {level} while holding level {previous}"
        );

        HELD_LEVEL.with(|held| held.set(level));
        Self { previous }
    }

    /// Level currently held by this thread, 0 when none.
    pub fn held_level() -> u8 {
        HELD_LEVEL.with(Cell::get)
    }
}

impl Drop for LockOrderGuard {
    fn drop(&mut self) {
        HELD_LEVEL.with(|held| held.set(self.previous));
    }
}

/// A mutex guard paired with its lock-order record.
///
/// Field order matters: the mutex guard is dropped before the level is restored.
pub struct Locked<'a, T> {
    guard: MutexGuard<'a, T>,
    _order: LockOrderGuard,
}

impl<'a, T> Locked<'a, T> {
    pub(crate) fn new(level: LockLevel, mutex: &'a parking_lot::Mutex<T>) -> Self {
        let order = LockOrderGuard::acquire(level);
        Self {
            guard: mutex.lock(),
            _order: order,
        }
    }
}

impl<T> Deref for Locked<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for Locked<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// Runs `f` while holding the ledger and state locks together, in order.
///
/// This is the only place the two synchronous domains nest.
pub fn with_locks<R>(
    ledger: &FairnessLedger,
    board: &StateBoard,
    f: impl FnOnce(&[u64], &BoardState) -> R,
) -> R {
    let counts = ledger.locked();
    let state = board.locked();
    f(&counts, &state)
}
