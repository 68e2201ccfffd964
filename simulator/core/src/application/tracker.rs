// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # State Tracker
//!
//! Samples the simulation on a fixed cadence, audits each sample and hands a
//! [`Report`] to a [`ReportSink`]. The tracker never mutates simulation state; its
//! only contact with the agents is the brief ledger/state critical section taken by
//! [`Simulation::sample`].
//!
//! ## Audits
//!
//! | Check | Finding | Level |
//! |-------|---------|-------|
//! | snapshot consistency | [`Finding::Inconsistent`] | `error` |
//! | ledger never decreases | [`Finding::Regression`] | `error` |
//! | neighbor lead below `T + 2` | [`Finding::FairnessExcursion`] | `warn` |
//! | no circular wait (optional) | [`Finding::CircularWait`] | `warn` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::lifecycle::RunSummary;
use crate::application::simulation::{Sample, Simulation};
use crate::domain::agent::{Activity, AgentId, SimulationId, Strategy};
use crate::domain::board::SnapshotViolation;
use crate::domain::resource::ResourceState;

/// Receives tracker output.
pub trait ReportSink: Send + Sync {
    fn on_report(&self, report: &Report);

    fn on_summary(&self, _summary: &RunSummary) {}
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn on_report(&self, _report: &Report) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRow {
    pub id: AgentId,
    pub strategy: Strategy,
    pub services: u64,
    pub activity: Activity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum Finding {
    Inconsistent { violation: SnapshotViolation },
    Regression { agent: AgentId, previous: u64, current: u64 },
    FairnessExcursion { agent: AgentId, lead: u64 },
    CircularWait { agents: Vec<String> },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inconsistent { violation } => write!(f, "inconsistent snapshot: {violation}"),
            Self::Regression {
                agent,
                previous,
                current,
            } => write!(f, "{agent} service count fell from {previous} to {current}"),
            Self::FairnessExcursion { agent, lead } => write!(f, "{agent} leads a neighbor by {lead}"),
            Self::CircularWait { agents } => write!(f, "circular wait among {}", agents.join(", ")),
        }
    }
}

/// One tracker poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub simulation_id: SimulationId,
    pub poll: u64,
    pub elapsed: Duration,
    pub agents: Vec<AgentRow>,
    pub resources: Vec<ResourceState>,
    pub findings: Vec<Finding>,
}

impl Report {
    pub fn max_lead(&self) -> u64 {
        let counts: Vec<u64> = self.agents.iter().map(|a| a.services).collect();
        crate::domain::fairness::max_neighbor_lead(&counts)
    }
}

/// Totals over every poll of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuditSummary {
    pub polls: u64,
    pub inconsistencies: u64,
    pub regressions: u64,
    pub fairness_excursions: u64,
    pub circular_waits: u64,
    pub max_lead: u64,
}

impl AuditSummary {
    /// No invariant was breached. Circular waits are transient and do not count.
    pub fn is_clean(&self) -> bool {
        self.inconsistencies == 0 && self.regressions == 0 && self.fairness_excursions == 0
    }

    fn absorb(&mut self, report: &Report) {
        self.polls += 1;
        self.max_lead = self.max_lead.max(report.max_lead());
        for finding in &report.findings {
            match finding {
                Finding::Inconsistent { .. } => self.inconsistencies += 1,
                Finding::Regression { .. } => self.regressions += 1,
                Finding::FairnessExcursion { .. } => self.fairness_excursions += 1,
                Finding::CircularWait { .. } => self.circular_waits += 1,
            }
        }
    }
}

pub struct StateTracker {
    simulation: Arc<Simulation>,
    sink: Arc<dyn ReportSink>,
    cancel: CancellationToken,
    started: Instant,
    previous: Option<Vec<u64>>,
    audit: AuditSummary,
}

impl StateTracker {
    pub fn new(simulation: Arc<Simulation>, sink: Arc<dyn ReportSink>) -> Self {
        let cancel = simulation.cancellation_token();
        Self {
            simulation,
            sink,
            cancel,
            started: Instant::now(),
            previous: None,
            audit: AuditSummary::default(),
        }
    }

    /// Polls until the simulation is stopped; returns the audit totals.
    pub async fn run(mut self) -> AuditSummary {
        let period = self.simulation.spec().tracker.poll_interval;
        info!(
            simulation_id = %self.simulation.id(),
            poll_interval = ?period,
            "Starting state tracker"
        );

        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let report = self.poll();
                    self.sink.on_report(&report);
                }
                _ = self.cancel.cancelled() => {
                    debug!("Shutdown signal received, stopping state tracker");
                    break;
                }
            }
        }

        info!(
            simulation_id = %self.simulation.id(),
            polls = self.audit.polls,
            max_lead = self.audit.max_lead,
            "State tracker stopped"
        );
        self.audit
    }

    /// Takes one sample, audits it and returns the report.
    pub fn poll(&mut self) -> Report {
        let Sample { counts, snapshot } = self.simulation.sample();
        let mut findings: Vec<Finding> = snapshot
            .violations()
            .into_iter()
            .map(|violation| Finding::Inconsistent { violation })
            .collect();

        if let Some(previous) = &self.previous {
            findings.extend(regressions(previous, &counts));
        }
        findings.extend(self.fairness_excursions(&counts));

        if self.simulation.spec().tracker.verify_liveness {
            let detection = self.simulation.edge_trace().detect();
            if detection.is_deadlock() {
                findings.push(Finding::CircularWait {
                    agents: detection.agents().to_vec(),
                });
            }
        }

        self.log(&findings);

        let agents = self
            .simulation
            .agents()
            .iter()
            .map(|agent| AgentRow {
                id: agent.id,
                strategy: agent.strategy,
                services: counts[agent.id.index()],
                activity: snapshot.activity(agent.id),
            })
            .collect();

        let report = Report {
            simulation_id: self.simulation.id(),
            poll: self.audit.polls + 1,
            elapsed: self.started.elapsed(),
            agents,
            resources: snapshot.resources().to_vec(),
            findings,
        };
        self.audit.absorb(&report);
        self.previous = Some(counts);
        report
    }

    pub fn audit(&self) -> AuditSummary {
        self.audit
    }

    fn fairness_excursions(&self, counts: &[u64]) -> Vec<Finding> {
        let limit = self.simulation.ledger().threshold() + 2;
        let n = counts.len();
        (0..n)
            .filter_map(|i| {
                let (left, right) = AgentId(i).neighbors(n);
                let lead = counts[i]
                    .saturating_sub(counts[left.index()])
                    .max(counts[i].saturating_sub(counts[right.index()]));
                (lead >= limit).then_some(Finding::FairnessExcursion {
                    agent: AgentId(i),
                    lead,
                })
            })
            .collect()
    }

    fn log(&self, findings: &[Finding]) {
        let simulation_id = self.simulation.id();
        for finding in findings {
            match finding {
                Finding::Inconsistent { violation } => {
                    error!(%simulation_id, %violation, "Inconsistent snapshot")
                }
                Finding::Regression { agent, previous, current } => {
                    error!(%simulation_id, %agent, previous, current, "Service count decreased")
                }
                Finding::FairnessExcursion { agent, lead } => {
                    warn!(%simulation_id, %agent, lead, "Fairness bound exceeded")
                }
                Finding::CircularWait { agents } => {
                    warn!(%simulation_id, ?agents, "Circular wait observed")
                }
            }
        }
    }
}

fn regressions(previous: &[u64], current: &[u64]) -> Vec<Finding> {
    previous
        .iter()
        .zip(current)
        .enumerate()
        .filter(|(_, (before, now))| now < before)
        .map(|(i, (before, now))| Finding::Regression {
            agent: AgentId(i),
            previous: *before,
            current: *now,
        })
        .collect()
}
