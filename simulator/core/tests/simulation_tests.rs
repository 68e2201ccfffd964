// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Whole-run scenarios. Paused-time tests advance the clock only when every task is
// idle, so a run of many simulated seconds finishes instantly.

use std::sync::Arc;
use std::time::Duration;

use contend_core::agent::Strategy;
use contend_core::application::{LifecycleController, Report, RunSummary, Simulation};
use contend_core::config::{Layout, SimulationSpec, StrategyMix};
use contend_core::events::SimulationEvent;
use contend_core::fairness::max_neighbor_lead;
use contend_core::infrastructure::{CollectingSink, EventBus, EventBusError};

const UNIT: Duration = Duration::from_millis(100);

async fn run(spec: SimulationSpec) -> (RunSummary, Vec<Report>) {
    let simulation = Arc::new(Simulation::new(spec).expect("valid spec"));
    let sink = Arc::new(CollectingSink::new());
    let summary = LifecycleController::new(simulation, sink.clone()).run().await;
    assert_eq!(sink.summary().as_ref(), Some(&summary));
    (summary, sink.reports())
}

fn assert_clean(summary: &RunSummary, reports: &[Report]) {
    assert_eq!(summary.failed_tasks, 0);
    assert!(summary.mutual_exclusion_held(), "{:?}", summary.resources);
    assert!(summary.audit.is_clean(), "{:?}", summary.audit);
    for report in reports {
        assert!(report.findings.is_empty(), "poll {}: {:?}", report.poll, report.findings);
    }
}

#[tokio::test(start_paused = true)]
async fn all_balanced_ring_stays_within_threshold() {
    let mut spec = SimulationSpec::scaled(6, StrategyMix::only(Strategy::Balanced, 6), UNIT);
    spec.service.mean_units = 1.0;
    spec.run_duration = UNIT * 10;

    let (summary, reports) = run(spec).await;

    assert_clean(&summary, &reports);
    assert!(max_neighbor_lead(&summary.services()) <= 3, "{:?}", summary.services());
    assert!(summary.total_services() > 0);
    // The last tick can coincide with the end of the run window.
    assert!((9..=10).contains(&reports.len()), "{} polls", reports.len());
}

#[tokio::test(start_paused = true)]
async fn ordered_and_voracious_interleaved_respect_doubled_bound() {
    let mix = StrategyMix {
        balanced: 0,
        ordered: 2,
        voracious: 2,
    };
    let mut spec = SimulationSpec::scaled(4, mix, UNIT);
    spec.layout = Layout::Interleaved;
    spec.run_duration = UNIT * 20;

    let (summary, reports) = run(spec).await;

    assert_clean(&summary, &reports);
    let threshold = 3;
    for report in &reports {
        assert!(report.max_lead() <= threshold + 1, "poll {}", report.poll);
    }
    assert!(max_neighbor_lead(&summary.services()) <= threshold + 1);

    let strategies: Vec<Strategy> = summary.agents.iter().map(|a| a.strategy).collect();
    assert_eq!(
        strategies,
        vec![
            Strategy::Ordered,
            Strategy::Voracious,
            Strategy::Ordered,
            Strategy::Voracious
        ]
    );
    for agent in summary.agents.iter().filter(|a| a.strategy == Strategy::Voracious) {
        assert_eq!(agent.stats.services % 2, 0, "{} has an odd count", agent.id);
    }
}

#[tokio::test(start_paused = true)]
async fn ring_of_two_balanced_agents_both_progress() {
    let mut spec = SimulationSpec::scaled(2, StrategyMix::only(Strategy::Balanced, 2), UNIT);
    spec.run_duration = UNIT * 20;

    let (summary, reports) = run(spec).await;

    assert_clean(&summary, &reports);
    assert!(summary.services().iter().all(|s| *s > 0), "{:?}", summary.services());
}

#[tokio::test(start_paused = true)]
async fn all_ordered_population_never_starves_or_cycles() {
    let mut spec = SimulationSpec::scaled(5, StrategyMix::only(Strategy::Ordered, 5), UNIT);
    spec.run_duration = UNIT * 60;
    spec.tracker.verify_liveness = true;

    let (summary, reports) = run(spec).await;

    assert_clean(&summary, &reports);
    assert_eq!(summary.audit.circular_waits, 0);
    assert!(summary.services().iter().all(|s| *s > 0), "{:?}", summary.services());
}

#[tokio::test(start_paused = true)]
async fn default_mix_samples_are_consistent_and_monotonic() {
    let mut spec = SimulationSpec::scaled(10, SimulationSpec::default().strategies, UNIT);
    spec.layout = Layout::Shuffled;
    spec.seed = Some(7);
    spec.run_duration = UNIT * 45;

    let (summary, reports) = run(spec).await;

    assert_clean(&summary, &reports);
    assert!(reports.len() >= 44, "{} polls", reports.len());
    for pair in reports.windows(2) {
        for (before, after) in pair[0].agents.iter().zip(&pair[1].agents) {
            assert!(after.services >= before.services);
        }
    }
    let last = reports.last().expect("at least one poll");
    for (row, agent) in last.agents.iter().zip(&summary.agents) {
        assert!(agent.stats.services >= row.services);
    }
}

#[tokio::test(start_paused = true)]
async fn external_stop_ends_the_run_early() {
    let spec = SimulationSpec::scaled(4, StrategyMix::only(Strategy::Balanced, 4), UNIT);
    let simulation = Arc::new(Simulation::new(spec).unwrap());
    let controller = LifecycleController::new(simulation.clone(), Arc::new(CollectingSink::new()));

    let handle = tokio::spawn(controller.run());
    tokio::time::sleep(UNIT * 5).await;
    simulation.stop();
    let summary = handle.await.unwrap();

    // Well short of the 45 unit window: at most one service and one wait after the stop.
    assert!(summary.elapsed < UNIT * 15, "{:?}", summary.elapsed);
    assert_eq!(summary.failed_tasks, 0);
}

#[tokio::test(start_paused = true)]
async fn completion_events_match_the_ledger() {
    let mut spec = SimulationSpec::scaled(3, StrategyMix::only(Strategy::Voracious, 3), UNIT);
    spec.run_duration = UNIT * 20;
    let bus = EventBus::new(1 << 16);
    let mut events = bus.subscribe();
    let simulation = Arc::new(Simulation::with_event_bus(spec, bus).unwrap());

    let summary = LifecycleController::new(simulation, Arc::new(CollectingSink::new()))
        .run()
        .await;

    let mut last_seen = vec![0u64; 3];
    let mut started = false;
    let mut stopped = false;
    loop {
        match events.try_recv() {
            Ok(SimulationEvent::ServiceCompleted { agent, services_completed, .. }) => {
                assert!(services_completed > last_seen[agent.index()]);
                last_seen[agent.index()] = services_completed;
            }
            Ok(SimulationEvent::SimulationStarted { population, .. }) => {
                assert_eq!(population, 3);
                started = true;
            }
            Ok(SimulationEvent::SimulationStopped { total_services, .. }) => {
                assert_eq!(total_services, summary.total_services());
                stopped = true;
            }
            Ok(_) => {}
            Err(EventBusError::Empty) => break,
            Err(e) => panic!("unexpected bus error: {e}"),
        }
    }
    assert!(started && stopped);
    assert_eq!(last_seen, summary.services());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mutual_exclusion_holds_under_real_parallelism() {
    let unit = Duration::from_millis(2);
    let mix = StrategyMix {
        balanced: 3,
        ordered: 2,
        voracious: 2,
    };
    let mut spec = SimulationSpec::scaled(7, mix, unit);
    spec.layout = Layout::Interleaved;
    spec.run_duration = Duration::from_millis(400);
    spec.tracker.poll_interval = Duration::from_millis(10);

    let (summary, reports) = run(spec).await;

    assert_eq!(summary.failed_tasks, 0);
    assert!(summary.mutual_exclusion_held(), "{:?}", summary.resources);
    assert_eq!(summary.audit.inconsistencies, 0);
    assert_eq!(summary.audit.regressions, 0);
    assert_eq!(summary.audit.fairness_excursions, 0);
    assert!(!reports.is_empty());
    assert!(summary.total_services() > 0);
}
