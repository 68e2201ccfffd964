// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `contend detect`: replay an allocation edge trace through the deadlock detector.
//!
//! One edge per line, `<agent> -> <resource>` for a request and
//! `<agent> <- <resource>` for an assignment. Blank lines and `#` comments are skipped;
//! reported edge indices count edges only.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use contend_detector::{detect_deadlock, Detection};

#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    /// Edge trace file ("-" for stdin)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print the verdict as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: DetectArgs) -> Result<()> {
    let content = if args.file.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read edges from stdin")?
    } else {
        std::fs::read_to_string(&args.file)
            .with_context(|| format!("Failed to read edge trace {:?}", args.file))?
    };

    let edges = edge_lines(&content);
    let detection = detect_deadlock(&edges).context("Invalid edge trace")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&detection).context("Failed to serialize verdict")?
        );
        return Ok(());
    }

    match &detection {
        Detection::Deadlock { agents, edge_index } => {
            println!(
                "{}",
                format!(
                    "✗ Deadlock after edge {} ({})",
                    edge_index, edges[*edge_index]
                )
                .red()
                .bold()
            );
            println!("  Blocked agents: {}", agents.join(" "));
        }
        Detection::Clear => {
            println!(
                "{}",
                format!("✓ No deadlock in {} edge(s)", edges.len()).green()
            );
        }
    }
    Ok(())
}

/// Edge lines of a trace file, without blanks or comments.
pub fn edge_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = "\
# three agents around three resources
A0 <- R0
A1 <- R1
A2 <- R2

A0 -> R1
A1 -> R2
A2 -> R0
";

    #[test]
    fn test_comments_and_blanks_are_skipped() {
        let edges = edge_lines(TRACE);
        assert_eq!(edges.len(), 6);
        assert_eq!(edges[3], "A0 -> R1");
    }

    #[test]
    fn test_trace_file_verdict() {
        let edges = edge_lines(TRACE);
        let detection = detect_deadlock(&edges).unwrap();
        assert_eq!(detection.edge_index(), Some(5));
        assert_eq!(detection.agents().len(), 3);
    }

    #[tokio::test]
    async fn test_execute_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.txt");
        std::fs::write(&path, TRACE).unwrap();

        execute(DetectArgs {
            file: path.clone(),
            json: true,
        })
        .await
        .unwrap();

        std::fs::write(&path, "A0 => R0\n").unwrap();
        let err = execute(DetectArgs { file: path, json: false }).await.unwrap_err();
        assert!(format!("{err:#}").contains("malformed"));
    }
}
