// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent worker: the repeating acquire / check / service / release cycle of one agent.

use chrono::Utc;
use metrics::{counter, gauge, Counter, Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::simulation::Simulation;
use crate::domain::agent::{Agent, Strategy};
use crate::domain::events::SimulationEvent;
use crate::domain::strategy::{for_strategy, AcquireContext, AcquisitionOutcome, AcquisitionStrategy};

/// How one cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Serviced,
    Vetoed,
    TimedOut,
    Unavailable,
}

struct WorkerMetrics {
    services: Counter,
    vetoes: Counter,
    timeouts: Counter,
    active: Gauge,
}

impl WorkerMetrics {
    fn new(agent: &Agent) -> Self {
        let strategy = agent.strategy.as_str();
        Self {
            services: counter!("contend_services_completed_total", "strategy" => strategy),
            vetoes: counter!("contend_fairness_vetoes_total", "strategy" => strategy),
            timeouts: counter!("contend_acquisition_timeouts_total", "strategy" => strategy),
            active: gauge!("contend_active_agents"),
        }
    }
}

pub struct AgentWorker {
    simulation: Arc<Simulation>,
    agent: Agent,
    strategy: Box<dyn AcquisitionStrategy>,
    cancel: CancellationToken,
    metrics: WorkerMetrics,
}

impl AgentWorker {
    pub fn new(simulation: Arc<Simulation>, agent: Agent) -> Self {
        let cancel = simulation.cancellation_token();
        Self {
            strategy: for_strategy(agent.strategy),
            metrics: WorkerMetrics::new(&agent),
            simulation,
            agent,
            cancel,
        }
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs cycles until the simulation is stopped.
    pub async fn run(self) {
        debug!(
            simulation_id = %self.simulation.id(),
            agent = %self.agent.id,
            strategy = %self.agent.strategy,
            "Agent worker started"
        );

        let timings = self.simulation.spec().timings;
        while !self.cancel.is_cancelled() {
            let pause = match self.cycle().await {
                // Only a balanced agent that found both resources taken skips the cool-down.
                CycleOutcome::Unavailable if self.agent.strategy == Strategy::Balanced => {
                    timings.retry_interval
                }
                _ => timings.cool_down,
            };
            self.backoff(pause).await;
        }

        let stats = self.simulation.stats(self.agent.id);
        info!(
            simulation_id = %self.simulation.id(),
            agent = %self.agent.id,
            strategy = %self.agent.strategy,
            services = stats.services,
            vetoes = stats.vetoes,
            timeouts = stats.timeouts,
            "Agent worker stopped"
        );
    }

    /// One attempt, and service if the attempt and the fairness check allow it.
    pub async fn cycle(&self) -> CycleOutcome {
        let simulation = self.simulation.as_ref();
        let id = self.agent.id;
        let ctx = AcquireContext::new(id, simulation.ring(), &simulation.spec().timings, simulation);

        let outcome = self.strategy.attempt(&ctx).await;
        let label = outcome.label();
        let pair = match outcome {
            AcquisitionOutcome::Acquired(pair) => pair,
            AcquisitionOutcome::Unavailable => {
                debug!(agent = %id, outcome = label, "Resources unavailable");
                simulation.record_unavailable(id);
                return CycleOutcome::Unavailable;
            }
            AcquisitionOutcome::TimedOut => {
                debug!(agent = %id, outcome = label, "Acquisition timed out");
                simulation.record_timeout(id);
                self.metrics.timeouts.increment(1);
                return CycleOutcome::TimedOut;
            }
        };

        if simulation.ledger().should_yield(id) {
            debug!(agent = %id, outcome = label, "Fairness veto, yielding resources");
            pair.release(&ctx);
            simulation.record_veto(id);
            self.metrics.vetoes.increment(1);
            return CycleOutcome::Vetoed;
        }

        let doubled = pair.doubled();
        let duration = simulation.timer().sample(doubled);
        simulation.board().begin_service(id);
        self.metrics.active.increment(1.0);
        simulation.publish(SimulationEvent::ServiceStarted {
            simulation_id: simulation.id(),
            agent: id,
            duration_ms: duration.as_millis() as u64,
            started_at: Utc::now(),
        });
        debug!(agent = %id, ?duration, doubled, "Service started");

        // Service is never cut short by cancellation.
        tokio::time::sleep(duration).await;

        simulation.board().end_service(id);
        self.metrics.active.decrement(1.0);
        pair.release(&ctx);
        let services_completed = simulation.ledger().record_completion(id, doubled);
        self.metrics.services.increment(if doubled { 2 } else { 1 });
        simulation.publish(SimulationEvent::ServiceCompleted {
            simulation_id: simulation.id(),
            agent: id,
            services_completed,
            completed_at: Utc::now(),
        });
        debug!(agent = %id, services_completed, "Service completed");

        CycleOutcome::Serviced
    }

    async fn backoff(&self, pause: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{Activity, AgentId};
    use crate::domain::config::{SimulationSpec, StrategyMix};
    use crate::domain::resource::ResourceId;
    use tokio::time::Instant;

    const UNIT: Duration = Duration::from_millis(100);

    fn simulation(strategy: Strategy, population: usize) -> Arc<Simulation> {
        let mut spec = SimulationSpec::scaled(population, StrategyMix::only(strategy, population), UNIT);
        spec.service.std_dev_units = 0.0;
        Arc::new(Simulation::new(spec).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_services_and_records_completion() {
        let simulation = simulation(Strategy::Balanced, 3);
        let worker = AgentWorker::new(simulation.clone(), simulation.agent(AgentId(0)));

        let started = Instant::now();
        assert_eq!(worker.cycle().await, CycleOutcome::Serviced);
        assert_eq!(started.elapsed(), UNIT * 2);
        assert_eq!(simulation.ledger().count(AgentId(0)), 1);
        assert_eq!(simulation.snapshot().activity(AgentId(0)), Activity::Idle);
        assert_eq!(simulation.ring().holder(ResourceId(0)), None);
        assert!(simulation.edge_trace().current_edges().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_voracious_service_is_doubled() {
        let simulation = simulation(Strategy::Voracious, 2);
        let worker = AgentWorker::new(simulation.clone(), simulation.agent(AgentId(1)));

        let started = Instant::now();
        assert_eq!(worker.cycle().await, CycleOutcome::Serviced);
        assert_eq!(started.elapsed(), UNIT * 4);
        assert_eq!(simulation.ledger().count(AgentId(1)), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leader_is_vetoed_and_releases() {
        let simulation = simulation(Strategy::Balanced, 3);
        for _ in 0..3 {
            simulation.ledger().record_completion(AgentId(1), false);
        }
        let worker = AgentWorker::new(simulation.clone(), simulation.agent(AgentId(1)));

        assert_eq!(worker.cycle().await, CycleOutcome::Vetoed);
        assert_eq!(simulation.stats(AgentId(1)).vetoes, 1);
        assert_eq!(simulation.ledger().count(AgentId(1)), 3);
        assert_eq!(simulation.ring().holder(ResourceId(1)), None);
        assert_eq!(simulation.ring().holder(ResourceId(2)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_agent_reports_unavailable() {
        let simulation = simulation(Strategy::Balanced, 3);
        let _left = simulation.ring().try_acquire(ResourceId(0), AgentId(2)).unwrap();
        let _right = simulation.ring().try_acquire(ResourceId(1), AgentId(1)).unwrap();
        let worker = AgentWorker::new(simulation.clone(), simulation.agent(AgentId(0)));

        assert_eq!(worker.cycle().await, CycleOutcome::Unavailable);
        assert_eq!(simulation.stats(AgentId(0)).unavailable, 1);
    }

    /// Runs `agent` for just under `units` time units while its resources stay taken.
    async fn blocked_attempts(simulation: &Arc<Simulation>, agent: AgentId, units: u32) -> u64 {
        let handle = AgentWorker::new(simulation.clone(), simulation.agent(agent)).start();
        tokio::time::sleep(UNIT * units - Duration::from_millis(1)).await;
        simulation.stop();
        handle.await.unwrap();
        simulation.stats(agent).unavailable
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordered_miss_waits_out_the_cool_down() {
        let simulation = simulation(Strategy::Ordered, 3);
        // Agent 0 reaches for its right resource first.
        let _taken = simulation.ring().try_acquire(ResourceId(1), AgentId(1)).unwrap();

        // Attempts at 0, 2, 4, ... 18 units.
        assert_eq!(blocked_attempts(&simulation, AgentId(0), 20).await, 10);
        assert_eq!(simulation.ledger().count(AgentId(0)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_balanced_miss_retries_early() {
        let simulation = simulation(Strategy::Balanced, 3);
        let _left = simulation.ring().try_acquire(ResourceId(0), AgentId(2)).unwrap();
        let _right = simulation.ring().try_acquire(ResourceId(1), AgentId(1)).unwrap();

        // Attempts at 0, 1, 2, ... 19 units.
        assert_eq!(blocked_attempts(&simulation, AgentId(0), 20).await, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_promptly_on_cancellation() {
        let simulation = simulation(Strategy::Ordered, 3);
        let worker = AgentWorker::new(simulation.clone(), simulation.agent(AgentId(2)));
        let handle = worker.start();

        tokio::time::sleep(UNIT * 10).await;
        simulation.stop();
        // At most one hold, one bounded wait and one service separate the worker from its exit.
        tokio::time::timeout(UNIT * 10, handle)
            .await
            .expect("worker should observe cancellation")
            .unwrap();
        assert!(simulation.ledger().count(AgentId(2)) > 0);
    }
}
