// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Report sinks: plain-text rendering to any writer, and an in-memory collector.

use parking_lot::Mutex;
use std::fmt::Write as _;
use std::io::Write;
use tracing::warn;

use crate::application::lifecycle::RunSummary;
use crate::application::tracker::{Report, ReportSink};
use crate::domain::resource::ResourceId;

/// Plain-text layout of reports and summaries.
pub struct TextReport;

impl TextReport {
    /// Poll header, state and findings.
    pub fn render(report: &Report) -> String {
        let mut out = Self::render_state(report);
        if !report.findings.is_empty() {
            let _ = writeln!(out, "\n{} finding(s):", report.findings.len());
            for finding in &report.findings {
                let _ = writeln!(out, "  ! {finding}");
            }
        }
        out
    }

    /// Markers and service counts in aligned columns, then resources and agents interleaved.
    pub fn render_state(report: &Report) -> String {
        let width = report
            .agents
            .iter()
            .map(|a| a.services.to_string().len())
            .max()
            .unwrap_or(1);

        let mut out = String::new();
        let _ = writeln!(out, "Poll {} at {:.1?}", report.poll, report.elapsed);
        out.push_str("          ");
        for agent in &report.agents {
            let _ = write!(out, " {:>width$}", agent.strategy.marker());
        }
        out.push_str("\nServices: ");
        for agent in &report.agents {
            let _ = write!(out, " {:>width$}", agent.services);
        }
        out.push_str("\n\n");

        for (agent, resource) in report.agents.iter().zip(&report.resources) {
            let _ = writeln!(out, "    {} is {}", ResourceId(agent.id.index()), resource);
            let _ = writeln!(
                out,
                "({}) {} is {}",
                agent.strategy.marker(),
                agent.id,
                agent.activity
            );
        }
        out
    }

    pub fn render_summary(summary: &RunSummary) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Simulation {} finished after {:.1?}: {} services",
            summary.simulation_id,
            summary.elapsed,
            summary.total_services()
        );
        let _ = writeln!(
            out,
            "{:<6} {:<10} {:>8} {:>7} {:>9} {:>12}",
            "AGENT", "STRATEGY", "SERVICES", "VETOES", "TIMEOUTS", "UNAVAILABLE"
        );
        for agent in &summary.agents {
            let _ = writeln!(
                out,
                "{:<6} {:<10} {:>8} {:>7} {:>9} {:>12}",
                agent.id.to_string(),
                agent.strategy.as_str(),
                agent.stats.services,
                agent.stats.vetoes,
                agent.stats.timeouts,
                agent.stats.unavailable
            );
        }
        let _ = writeln!(out, "{:<9} {:>13}", "RESOURCE", "PEAK HOLDERS");
        for resource in &summary.resources {
            let _ = writeln!(out, "{:<9} {:>13}", resource.id.to_string(), resource.peak_holders);
        }
        let audit = &summary.audit;
        let _ = writeln!(
            out,
            "Audit: {} polls, max lead {}, {} inconsistent, {} regressions, {} fairness excursions, {} circular waits",
            audit.polls,
            audit.max_lead,
            audit.inconsistencies,
            audit.regressions,
            audit.fairness_excursions,
            audit.circular_waits
        );
        out
    }
}

/// Writes rendered reports to `W`.
pub struct TextReportWriter<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> TextReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn write(&self, text: &str) {
        let mut out = self.out.lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            warn!("Failed to write report: {}", e);
        }
    }
}

impl<W: Write + Send> ReportSink for TextReportWriter<W> {
    fn on_report(&self, report: &Report) {
        self.write(&format!("\n{}", TextReport::render(report)));
    }

    fn on_summary(&self, summary: &RunSummary) {
        self.write(&format!("\n{}", TextReport::render_summary(summary)));
    }
}

/// Keeps every report and the final summary in memory.
#[derive(Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<Report>>,
    summary: Mutex<Option<RunSummary>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    pub fn summary(&self) -> Option<RunSummary> {
        self.summary.lock().clone()
    }
}

impl ReportSink for CollectingSink {
    fn on_report(&self, report: &Report) {
        self.reports.lock().push(report.clone());
    }

    fn on_summary(&self, summary: &RunSummary) {
        *self.summary.lock() = Some(summary.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tracker::{AgentRow, Finding};
    use crate::domain::agent::{Activity, AgentId, SimulationId, Strategy};
    use crate::domain::resource::ResourceState;
    use std::time::Duration;

    fn report() -> Report {
        Report {
            simulation_id: SimulationId::new(),
            poll: 4,
            elapsed: Duration::from_secs(4),
            agents: vec![
                AgentRow {
                    id: AgentId(0),
                    strategy: Strategy::Ordered,
                    services: 12,
                    activity: Activity::Active,
                },
                AgentRow {
                    id: AgentId(1),
                    strategy: Strategy::Voracious,
                    services: 2,
                    activity: Activity::Idle,
                },
            ],
            resources: vec![ResourceState::Held, ResourceState::Held],
            findings: vec![],
        }
    }

    #[test]
    fn test_render_aligns_markers_with_counts() {
        let text = TextReport::render(&report());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Poll 4 at 4.0s");
        assert_eq!(lines[1], "            O  V");
        assert_eq!(lines[2], "Services:  12  2");
        assert!(text.contains("    R0 is HELD\n(O) A0 is ACTIVE\n"));
        assert!(text.contains("(V) A1 is IDLE"));
    }

    #[test]
    fn test_findings_follow_state() {
        let mut report = report();
        report.findings.push(Finding::FairnessExcursion {
            agent: AgentId(0),
            lead: 10,
        });
        let text = TextReport::render(&report);
        assert!(text.starts_with(&TextReport::render_state(&report)));
        assert!(text.ends_with("1 finding(s):\n  ! A0 leads a neighbor by 10\n"));
    }

    #[test]
    fn test_writer_appends_reports() {
        let writer = TextReportWriter::new(Vec::new());
        writer.on_report(&report());
        writer.on_report(&report());
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text.matches("Poll 4").count(), 2);
    }

    #[test]
    fn test_collecting_sink_keeps_reports() {
        let sink = CollectingSink::new();
        sink.on_report(&report());
        assert_eq!(sink.reports().len(), 1);
        assert!(sink.summary().is_none());
    }
}
