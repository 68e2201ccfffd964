// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Console report sink with colored headers.

use colored::Colorize;

use contend_core::application::{Finding, Report, ReportSink, RunSummary};
use contend_core::infrastructure::TextReport;

pub struct ConsoleSink {
    quiet: bool,
}

impl ConsoleSink {
    /// A quiet sink prints only the final summary.
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl ReportSink for ConsoleSink {
    fn on_report(&self, report: &Report) {
        if self.quiet {
            return;
        }
        let text = TextReport::render_state(report);
        let (header, body) = split_header(&text);
        println!();
        println!("{}", header.cyan().bold());
        print!("{body}");
        for finding in &report.findings {
            println!("{}", colorize(finding));
        }
    }

    fn on_summary(&self, summary: &RunSummary) {
        let text = TextReport::render_summary(summary);
        let (header, body) = split_header(&text);
        println!();
        println!("{}", header.green().bold());
        print!("{body}");
        if summary.mutual_exclusion_held() && summary.audit.is_clean() {
            println!("{}", "✓ All invariants held".green());
        }
    }
}

fn split_header(text: &str) -> (&str, &str) {
    text.split_once('\n').unwrap_or((text, ""))
}

/// Invariant breaches in red, transient excursions in yellow.
pub fn colorize(finding: &Finding) -> String {
    let line = format!("! {finding}");
    match finding {
        Finding::Inconsistent { .. } | Finding::Regression { .. } => line.red().to_string(),
        Finding::FairnessExcursion { .. } | Finding::CircularWait { .. } => {
            line.yellow().to_string()
        }
    }
}
