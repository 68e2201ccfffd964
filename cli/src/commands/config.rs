// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use contend_core::config::{SimulationManifest, CONFIG_PATH_ENV};

const ANNOTATED_TEMPLATE: &str = include_str!("../../templates/contend-config.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./contend-config.yaml")]
        output: PathBuf,

        /// Include comments describing every field
        #[arg(long)]
        examples: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate {
            output,
            examples,
            force,
        } => generate(&output, examples, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let manifest = SimulationManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./contend-config.yaml");
        println!("  4. ~/.contend/config.yaml");
        println!("  5. /etc/contend/config.yaml");
        println!();
    }

    let spec = &manifest.spec;
    println!("{} {}", "Simulation:".bold(), manifest.metadata.name);
    println!();

    println!("{}", "Population:".bold());
    println!("  Agents: {}", spec.population);
    println!(
        "  Strategies: {} balanced, {} ordered, {} voracious",
        spec.strategies.balanced, spec.strategies.ordered, spec.strategies.voracious
    );
    println!("  Layout: {:?}", spec.layout);
    match spec.seed {
        Some(seed) => println!("  Seed: {}", seed),
        None => println!("  Seed: {}", "(random)".dimmed()),
    }
    println!();

    println!("{}", "Service:".bold());
    println!("  Time unit: {:?}", spec.service.time_unit);
    println!(
        "  Duration: mean {} units, std dev {} units",
        spec.service.mean_units, spec.service.std_dev_units
    );
    println!("  Fairness threshold: {}", spec.fairness.threshold);
    println!();

    println!("{}", "Timings:".bold());
    let t = &spec.timings;
    println!("  Retry interval: {:?}", t.retry_interval);
    println!("  Balanced wait: {:?}", t.balanced_wait);
    println!("  Ordered hold/wait: {:?} / {:?}", t.ordered_hold, t.ordered_wait);
    println!("  Voracious wait: {:?}", t.voracious_wait);
    println!("  Cool-down: {:?}", t.cool_down);
    println!();

    println!("{}", "Run:".bold());
    println!("  Duration: {:?}", spec.run_duration);
    println!("  Poll interval: {:?}", spec.tracker.poll_interval);
    println!("  Verify liveness: {}", spec.tracker.verify_liveness);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let manifest =
        SimulationManifest::load_or_default(config_path).context("Failed to load configuration")?;

    manifest
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, with_examples: bool, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let sample = render_sample(with_examples)?;
    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn render_sample(with_examples: bool) -> Result<String> {
    if with_examples {
        Ok(ANNOTATED_TEMPLATE.to_string())
    } else {
        serde_yaml::to_string(&SimulationManifest::default())
            .context("Failed to render default configuration")
    }
}
