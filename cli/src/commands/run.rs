// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `contend run`: load the manifest, apply flag overrides, run, print the summary.

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use contend_core::application::{LifecycleController, Simulation};
use contend_core::config::{Layout, SimulationManifest, SimulationSpec, StrategyTimings};

use crate::console::ConsoleSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    Shuffled,
    Grouped,
    Interleaved,
}

impl From<LayoutArg> for Layout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Shuffled => Layout::Shuffled,
            LayoutArg::Grouped => Layout::Grouped,
            LayoutArg::Interleaved => Layout::Interleaved,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Number of agents (defaults to the sum of the strategy counts when any is given)
    #[arg(long)]
    pub population: Option<usize>,

    /// Balanced agents
    #[arg(long)]
    pub balanced: Option<usize>,

    /// Ordered agents
    #[arg(long)]
    pub ordered: Option<usize>,

    /// Voracious agents
    #[arg(long)]
    pub voracious: Option<usize>,

    /// Seating of strategies around the ring
    #[arg(long, value_enum)]
    pub layout: Option<LayoutArg>,

    /// Seed for the shuffled layout
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fairness threshold
    #[arg(long)]
    pub threshold: Option<u64>,

    /// Run duration (e.g. 45s, 2m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Tracker poll interval
    #[arg(long, value_parser = parse_duration)]
    pub poll: Option<Duration>,

    /// Mean service time, in time units
    #[arg(long)]
    pub mean_service: Option<f64>,

    /// Length of one time unit; rescales every strategy timing
    #[arg(long, value_parser = parse_duration)]
    pub time_unit: Option<Duration>,

    /// Check the live wait-for graph for cycles on every poll
    #[arg(long)]
    pub verify_liveness: bool,

    /// Print only the final summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Applies every flag that was given to `spec`.
    pub fn apply(&self, spec: &mut SimulationSpec) {
        let counts_given =
            self.balanced.is_some() || self.ordered.is_some() || self.voracious.is_some();
        if counts_given {
            spec.strategies.balanced = self.balanced.unwrap_or(0);
            spec.strategies.ordered = self.ordered.unwrap_or(0);
            spec.strategies.voracious = self.voracious.unwrap_or(0);
            spec.population = spec.strategies.total();
        }
        if let Some(population) = self.population {
            spec.population = population;
        }
        if let Some(layout) = self.layout {
            spec.layout = layout.into();
        }
        if let Some(seed) = self.seed {
            spec.seed = Some(seed);
        }
        if let Some(threshold) = self.threshold {
            spec.fairness.threshold = threshold;
        }
        if let Some(unit) = self.time_unit {
            spec.service.time_unit = unit;
            spec.timings = StrategyTimings::for_unit(unit);
        }
        if let Some(mean) = self.mean_service {
            spec.service.mean_units = mean;
        }
        if let Some(duration) = self.duration {
            spec.run_duration = duration;
        }
        if let Some(poll) = self.poll {
            spec.tracker.poll_interval = poll;
        }
        if self.verify_liveness {
            spec.tracker.verify_liveness = true;
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

pub async fn execute(args: RunArgs, config_override: Option<PathBuf>) -> Result<()> {
    let mut manifest =
        SimulationManifest::load_or_default(config_override).context("Failed to load configuration")?;
    args.apply(&mut manifest.spec);
    manifest
        .validate()
        .context("Configuration validation failed")?;

    let simulation = Arc::new(
        Simulation::new(manifest.spec.clone()).context("Failed to build simulation")?,
    );
    info!(
        name = %manifest.metadata.name,
        simulation_id = %simulation.id(),
        "Simulation configured"
    );

    let stopper = simulation.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping simulation");
            stopper.stop();
        }
    });

    let sink = Arc::new(ConsoleSink::new(args.quiet || args.json));
    let summary = LifecycleController::new(simulation, sink).run().await;
    ctrl_c.abort();

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    }

    if summary.failed_tasks > 0 {
        bail!("{} simulation task(s) failed", summary.failed_tasks);
    }
    if !summary.mutual_exclusion_held() || !summary.audit.is_clean() {
        eprintln!("{}", "✗ Invariant violations were recorded during the run".red());
    }
    Ok(())
}
