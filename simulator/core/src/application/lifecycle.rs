// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lifecycle controller: starts the agent workers and the tracker, lets them run for
//! the configured window, then cancels and joins every task.

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info};

use crate::application::agent_worker::AgentWorker;
use crate::application::simulation::{AgentStats, Simulation};
use crate::application::tracker::{AuditSummary, ReportSink, StateTracker};
use crate::domain::agent::{AgentId, SimulationId, Strategy};
use crate::domain::events::SimulationEvent;
use crate::domain::resource::ResourceId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: AgentId,
    pub strategy: Strategy,
    #[serde(flatten)]
    pub stats: AgentStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub id: ResourceId,
    /// Highest number of simultaneous holders observed.
    pub peak_holders: usize,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub simulation_id: SimulationId,
    pub elapsed: Duration,
    pub agents: Vec<AgentSummary>,
    pub resources: Vec<ResourceSummary>,
    pub audit: AuditSummary,
    /// Worker or tracker tasks that panicked.
    pub failed_tasks: usize,
}

impl RunSummary {
    pub fn total_services(&self) -> u64 {
        self.agents.iter().map(|a| a.stats.services).sum()
    }

    pub fn services(&self) -> Vec<u64> {
        self.agents.iter().map(|a| a.stats.services).collect()
    }

    /// Every resource was held by at most one agent at a time.
    pub fn mutual_exclusion_held(&self) -> bool {
        self.resources.iter().all(|r| r.peak_holders <= 1)
    }
}

pub struct LifecycleController {
    simulation: Arc<Simulation>,
    sink: Arc<dyn ReportSink>,
}

impl LifecycleController {
    pub fn new(simulation: Arc<Simulation>, sink: Arc<dyn ReportSink>) -> Self {
        Self { simulation, sink }
    }

    pub fn simulation(&self) -> &Arc<Simulation> {
        &self.simulation
    }

    /// Runs for the configured duration, or until the simulation is stopped externally.
    pub async fn run(self) -> RunSummary {
        let simulation = self.simulation;
        let started = Instant::now();
        let run_duration = simulation.spec().run_duration;

        info!(
            simulation_id = %simulation.id(),
            population = simulation.population(),
            run_duration = ?run_duration,
            "Starting simulation"
        );
        simulation.publish(SimulationEvent::SimulationStarted {
            simulation_id: simulation.id(),
            population: simulation.population(),
            seating: simulation.agents().iter().map(|a| a.strategy).collect(),
            started_at: Utc::now(),
        });

        let tracker = tokio::spawn(StateTracker::new(simulation.clone(), self.sink.clone()).run());
        let workers: Vec<_> = simulation
            .agents()
            .iter()
            .map(|agent| AgentWorker::new(simulation.clone(), *agent).start())
            .collect();

        let token = simulation.cancellation_token();
        tokio::select! {
            _ = tokio::time::sleep(run_duration) => {
                info!(simulation_id = %simulation.id(), "Run window elapsed, stopping agents");
            }
            _ = token.cancelled() => {
                info!(simulation_id = %simulation.id(), "Stop requested, stopping agents");
            }
        }
        simulation.stop();

        let mut failed_tasks = 0;
        for (index, result) in join_all(workers).await.into_iter().enumerate() {
            if let Err(e) = result {
                error!(agent = %AgentId(index), "Agent worker failed: {}", e);
                failed_tasks += 1;
            }
        }
        let audit = match tracker.await {
            Ok(audit) => audit,
            Err(e) => {
                error!("State tracker failed: {}", e);
                failed_tasks += 1;
                AuditSummary::default()
            }
        };

        let summary = summarize(&simulation, started.elapsed(), audit, failed_tasks);
        simulation.publish(SimulationEvent::SimulationStopped {
            simulation_id: simulation.id(),
            total_services: summary.total_services(),
            stopped_at: Utc::now(),
        });
        info!(
            simulation_id = %simulation.id(),
            total_services = summary.total_services(),
            elapsed = ?summary.elapsed,
            "Simulation finished"
        );
        self.sink.on_summary(&summary);
        summary
    }
}

fn summarize(
    simulation: &Simulation,
    elapsed: Duration,
    audit: AuditSummary,
    failed_tasks: usize,
) -> RunSummary {
    RunSummary {
        simulation_id: simulation.id(),
        elapsed,
        agents: simulation
            .agents()
            .iter()
            .map(|agent| AgentSummary {
                id: agent.id,
                strategy: agent.strategy,
                stats: simulation.stats(agent.id),
            })
            .collect(),
        resources: simulation
            .ring()
            .ids()
            .map(|id| ResourceSummary {
                id,
                peak_holders: simulation.ring().peak_holders(id),
            })
            .collect(),
        audit,
        failed_tasks,
    }
}
