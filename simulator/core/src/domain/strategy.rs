// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Acquisition Strategies
//!
//! One [`AcquisitionStrategy`] per [`Strategy`] variant. A strategy performs a single
//! acquisition attempt for one agent and reports an [`AcquisitionOutcome`]; the agent
//! worker owns everything after that (fairness check, service, backoff).
//!
//! | Strategy | First resource | Second resource | On failure |
//! |----------|----------------|-----------------|------------|
//! | Balanced | both non-blocking, right then left | bounded wait for the missing one | release, retry |
//! | Ordered | higher index, non-blocking, then hold | bounded wait for the lower index | release, retry |
//! | Voracious | left, bounded wait | right, bounded wait | release, retry |
//!
//! Ordered agents do not all start on their right resource. Agent `N-1` starts on its
//! left one (`R(N-1)`), because its right one is `R0`. This departs from a uniform
//! right-first rule on purpose: "higher index first" is one global order, and a
//! right-first ring lets all `N` agents each hold one resource and wait on the next.
//!
//! After any cycle the worker cools down, except a Balanced attempt that found both
//! resources taken, which retries after the shorter retry interval.
//!
//! Every lock operation is reported to an [`AcquisitionObserver`]. Releases are
//! reported *before* the guard is dropped so observers never see a resource as free
//! while it is still locked.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::agent::{AgentId, Strategy};
use crate::domain::config::StrategyTimings;
use crate::domain::resource::{ResourceGuard, ResourceId, ResourceRing};

/// Callbacks for individual lock operations.
pub trait AcquisitionObserver: Send + Sync {
    /// A bounded wait for `resource` is starting.
    fn on_requested(&self, agent: AgentId, resource: ResourceId);
    fn on_acquired(&self, agent: AgentId, resource: ResourceId);
    /// A bounded wait for `resource` ended without acquiring it.
    fn on_abandoned(&self, agent: AgentId, resource: ResourceId);
    /// `resource` is about to be released.
    fn on_released(&self, agent: AgentId, resource: ResourceId);
}

/// Observer that ignores every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AcquisitionObserver for NoopObserver {
    fn on_requested(&self, _: AgentId, _: ResourceId) {}
    fn on_acquired(&self, _: AgentId, _: ResourceId) {}
    fn on_abandoned(&self, _: AgentId, _: ResourceId) {}
    fn on_released(&self, _: AgentId, _: ResourceId) {}
}

/// Everything a strategy needs for one attempt.
pub struct AcquireContext<'a> {
    pub agent: AgentId,
    pub left: ResourceId,
    pub right: ResourceId,
    pub ring: &'a ResourceRing,
    pub timings: &'a StrategyTimings,
    pub observer: &'a dyn AcquisitionObserver,
}

impl<'a> AcquireContext<'a> {
    pub fn new(
        agent: AgentId,
        ring: &'a ResourceRing,
        timings: &'a StrategyTimings,
        observer: &'a dyn AcquisitionObserver,
    ) -> Self {
        let population = ring.len();
        Self {
            agent,
            left: agent.left(population),
            right: agent.right(population),
            ring,
            timings,
            observer,
        }
    }

    pub fn try_take(&self, resource: ResourceId) -> Option<ResourceGuard> {
        let guard = self.ring.try_acquire(resource, self.agent)?;
        self.observer.on_acquired(self.agent, resource);
        Some(guard)
    }

    pub async fn take_within(&self, resource: ResourceId, wait: Duration) -> Option<ResourceGuard> {
        self.observer.on_requested(self.agent, resource);
        match self.ring.try_acquire_within(resource, self.agent, wait).await {
            Some(guard) => {
                self.observer.on_acquired(self.agent, resource);
                Some(guard)
            }
            None => {
                self.observer.on_abandoned(self.agent, resource);
                None
            }
        }
    }

    pub fn release(&self, guard: ResourceGuard) {
        self.observer.on_released(self.agent, guard.resource());
        guard.release();
    }
}

/// Both adjacent resources, held by one agent.
#[derive(Debug)]
#[must_use = "dropping a HeldPair releases both resources without notifying observers"]
pub struct HeldPair {
    left: ResourceGuard,
    right: ResourceGuard,
    doubled: bool,
}

impl HeldPair {
    pub fn new(left: ResourceGuard, right: ResourceGuard, doubled: bool) -> Self {
        Self {
            left,
            right,
            doubled,
        }
    }

    pub fn left(&self) -> ResourceId {
        self.left.resource()
    }

    pub fn right(&self) -> ResourceId {
        self.right.resource()
    }

    /// Service runs twice as long and is credited twice.
    pub fn doubled(&self) -> bool {
        self.doubled
    }

    pub fn release(self, ctx: &AcquireContext<'_>) {
        ctx.release(self.right);
        ctx.release(self.left);
    }
}

/// Result of one acquisition attempt.
#[derive(Debug)]
pub enum AcquisitionOutcome {
    Acquired(HeldPair),
    /// Nothing could be taken without waiting.
    Unavailable,
    /// A bounded wait expired; anything taken has been released.
    TimedOut,
}

impl AcquisitionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Acquired(_) => "acquired",
            Self::Unavailable => "unavailable",
            Self::TimedOut => "timed_out",
        }
    }
}

#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn kind(&self) -> Strategy;

    async fn attempt(&self, ctx: &AcquireContext<'_>) -> AcquisitionOutcome;
}

pub fn for_strategy(strategy: Strategy) -> Box<dyn AcquisitionStrategy> {
    match strategy {
        Strategy::Balanced => Box::new(BalancedStrategy),
        Strategy::Ordered => Box::new(OrderedStrategy),
        Strategy::Voracious => Box::new(VoraciousStrategy),
    }
}

/// Grabs whatever is free, waits briefly for the rest.
#[derive(Debug, Default, Clone, Copy)]
pub struct BalancedStrategy;

#[async_trait]
impl AcquisitionStrategy for BalancedStrategy {
    fn kind(&self) -> Strategy {
        Strategy::Balanced
    }

    async fn attempt(&self, ctx: &AcquireContext<'_>) -> AcquisitionOutcome {
        let right = ctx.try_take(ctx.right);
        let left = ctx.try_take(ctx.left);
        let wait = ctx.timings.balanced_wait;

        match (left, right) {
            (Some(left), Some(right)) => {
                AcquisitionOutcome::Acquired(HeldPair::new(left, right, false))
            }
            (None, None) => AcquisitionOutcome::Unavailable,
            (Some(left), None) => match ctx.take_within(ctx.right, wait).await {
                Some(right) => AcquisitionOutcome::Acquired(HeldPair::new(left, right, false)),
                None => {
                    ctx.release(left);
                    AcquisitionOutcome::TimedOut
                }
            },
            (None, Some(right)) => match ctx.take_within(ctx.left, wait).await {
                Some(left) => AcquisitionOutcome::Acquired(HeldPair::new(left, right, false)),
                None => {
                    ctx.release(right);
                    AcquisitionOutcome::TimedOut
                }
            },
        }
    }
}

/// Takes the higher-indexed resource first, holds it, then waits for the other.
///
/// Agent `N-1` is the only agent whose higher-indexed resource is its left one, so
/// the first resource follows one global order around the ring.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedStrategy;

impl OrderedStrategy {
    /// `(first, second)` for the agent in `ctx`.
    pub fn order(ctx: &AcquireContext<'_>) -> (ResourceId, ResourceId) {
        if ctx.left > ctx.right {
            (ctx.left, ctx.right)
        } else {
            (ctx.right, ctx.left)
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for OrderedStrategy {
    fn kind(&self) -> Strategy {
        Strategy::Ordered
    }

    async fn attempt(&self, ctx: &AcquireContext<'_>) -> AcquisitionOutcome {
        let (first_id, second_id) = Self::order(ctx);
        let Some(first) = ctx.try_take(first_id) else {
            return AcquisitionOutcome::Unavailable;
        };

        tokio::time::sleep(ctx.timings.ordered_hold).await;

        match ctx.take_within(second_id, ctx.timings.ordered_wait).await {
            Some(second) if first_id == ctx.right => {
                AcquisitionOutcome::Acquired(HeldPair::new(second, first, false))
            }
            Some(second) => AcquisitionOutcome::Acquired(HeldPair::new(first, second, false)),
            None => {
                ctx.release(first);
                AcquisitionOutcome::TimedOut
            }
        }
    }
}

/// Waits for left, then right; services and is credited double.
#[derive(Debug, Default, Clone, Copy)]
pub struct VoraciousStrategy;

#[async_trait]
impl AcquisitionStrategy for VoraciousStrategy {
    fn kind(&self) -> Strategy {
        Strategy::Voracious
    }

    async fn attempt(&self, ctx: &AcquireContext<'_>) -> AcquisitionOutcome {
        let wait = ctx.timings.voracious_wait;
        let Some(left) = ctx.take_within(ctx.left, wait).await else {
            return AcquisitionOutcome::TimedOut;
        };
        match ctx.take_within(ctx.right, wait).await {
            Some(right) => AcquisitionOutcome::Acquired(HeldPair::new(left, right, true)),
            None => {
                ctx.release(left);
                AcquisitionOutcome::TimedOut
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    const UNIT: Duration = Duration::from_millis(100);

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn push(&self, op: &str, agent: AgentId, resource: ResourceId) {
            self.calls.lock().push(format!("{op} {agent} {resource}"));
        }
    }

    impl AcquisitionObserver for Recorder {
        fn on_requested(&self, agent: AgentId, resource: ResourceId) {
            self.push("request", agent, resource);
        }
        fn on_acquired(&self, agent: AgentId, resource: ResourceId) {
            self.push("acquire", agent, resource);
        }
        fn on_abandoned(&self, agent: AgentId, resource: ResourceId) {
            self.push("abandon", agent, resource);
        }
        fn on_released(&self, agent: AgentId, resource: ResourceId) {
            self.push("release", agent, resource);
        }
    }

    fn timings() -> StrategyTimings {
        StrategyTimings::for_unit(UNIT)
    }

    #[tokio::test(start_paused = true)]
    async fn test_balanced_takes_both_free_resources() {
        let ring = ResourceRing::new(4);
        let timings = timings();
        let recorder = Recorder::default();
        let ctx = AcquireContext::new(AgentId(1), &ring, &timings, &recorder);

        let AcquisitionOutcome::Acquired(pair) = BalancedStrategy.attempt(&ctx).await else {
            panic!("expected both resources");
        };
        assert_eq!((pair.left(), pair.right()), (ResourceId(1), ResourceId(2)));
        assert!(!pair.doubled());
        assert_eq!(recorder.calls(), vec!["acquire A1 R2", "acquire A1 R1"]);

        pair.release(&ctx);
        assert_eq!(ring.holder(ResourceId(1)), None);
        assert_eq!(ring.holder(ResourceId(2)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_balanced_reports_unavailable_without_waiting() {
        let ring = ResourceRing::new(4);
        let _l = ring.try_acquire(ResourceId(1), AgentId(0)).unwrap();
        let _r = ring.try_acquire(ResourceId(2), AgentId(2)).unwrap();
        let timings = timings();
        let ctx = AcquireContext::new(AgentId(1), &ring, &timings, &NoopObserver);

        let started = Instant::now();
        let outcome = BalancedStrategy.attempt(&ctx).await;
        assert!(matches!(outcome, AcquisitionOutcome::Unavailable));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_balanced_releases_partial_hold_on_timeout() {
        let ring = ResourceRing::new(4);
        let _r = ring.try_acquire(ResourceId(2), AgentId(2)).unwrap();
        let timings = timings();
        let recorder = Recorder::default();
        let ctx = AcquireContext::new(AgentId(1), &ring, &timings, &recorder);

        let started = Instant::now();
        let outcome = BalancedStrategy.attempt(&ctx).await;
        assert!(matches!(outcome, AcquisitionOutcome::TimedOut));
        assert_eq!(started.elapsed(), timings.balanced_wait);
        assert_eq!(ring.holder(ResourceId(1)), None);
        assert_eq!(
            recorder.calls(),
            vec!["acquire A1 R1", "request A1 R2", "abandon A1 R2", "release A1 R1"]
        );
    }

    #[test]
    fn test_ordered_first_resource_follows_global_order() {
        let ring = ResourceRing::new(5);
        let timings = timings();
        let first = |agent| {
            let ctx = AcquireContext::new(AgentId(agent), &ring, &timings, &NoopObserver);
            OrderedStrategy::order(&ctx).0
        };
        assert_eq!(first(0), ResourceId(1));
        assert_eq!(first(3), ResourceId(4));
        // The agent closing the ring starts on its left.
        assert_eq!(first(4), ResourceId(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordered_holds_then_waits_for_second() {
        let ring = ResourceRing::new(5);
        let _blocker = ring.try_acquire(ResourceId(0), AgentId(0)).unwrap();
        let timings = timings();
        let ctx = AcquireContext::new(AgentId(4), &ring, &timings, &NoopObserver);

        let started = Instant::now();
        let outcome = OrderedStrategy.attempt(&ctx).await;
        assert!(matches!(outcome, AcquisitionOutcome::TimedOut));
        assert_eq!(started.elapsed(), timings.ordered_hold + timings.ordered_wait);
        assert_eq!(ring.holder(ResourceId(4)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordered_pair_is_reported_left_right() {
        let ring = ResourceRing::new(3);
        let timings = timings();
        let ctx = AcquireContext::new(AgentId(0), &ring, &timings, &NoopObserver);

        let AcquisitionOutcome::Acquired(pair) = OrderedStrategy.attempt(&ctx).await else {
            panic!("expected both resources");
        };
        assert_eq!((pair.left(), pair.right()), (ResourceId(0), ResourceId(1)));
        pair.release(&ctx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordered_unavailable_when_first_is_held() {
        let ring = ResourceRing::new(3);
        let _blocker = ring.try_acquire(ResourceId(1), AgentId(1)).unwrap();
        let timings = timings();
        let ctx = AcquireContext::new(AgentId(0), &ring, &timings, &NoopObserver);
        assert!(matches!(
            OrderedStrategy.attempt(&ctx).await,
            AcquisitionOutcome::Unavailable
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_voracious_waits_and_doubles() {
        let ring = ResourceRing::new(3);
        let timings = timings();
        let ctx = AcquireContext::new(AgentId(2), &ring, &timings, &NoopObserver);

        let AcquisitionOutcome::Acquired(pair) = VoraciousStrategy.attempt(&ctx).await else {
            panic!("expected both resources");
        };
        assert!(pair.doubled());
        assert_eq!((pair.left(), pair.right()), (ResourceId(2), ResourceId(0)));
        pair.release(&ctx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_voracious_times_out_on_left() {
        let ring = ResourceRing::new(3);
        let _blocker = ring.try_acquire(ResourceId(2), AgentId(1)).unwrap();
        let timings = timings();
        let recorder = Recorder::default();
        let ctx = AcquireContext::new(AgentId(2), &ring, &timings, &recorder);

        let started = Instant::now();
        assert!(matches!(
            VoraciousStrategy.attempt(&ctx).await,
            AcquisitionOutcome::TimedOut
        ));
        assert_eq!(started.elapsed(), timings.voracious_wait);
        assert_eq!(recorder.calls(), vec!["request A2 R2", "abandon A2 R2"]);
        assert_eq!(ring.holder(ResourceId(0)), None);
    }

    #[test]
    fn test_factory_matches_kind() {
        for strategy in Strategy::ALL {
            assert_eq!(for_strategy(strategy).kind(), strategy);
        }
    }
}
