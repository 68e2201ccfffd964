// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Simulation Configuration Types
//
// Defines the configuration manifest for a simulation run:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Population and strategy mix, and how strategies are seated around the ring
// - Fairness threshold
// - Service time distribution
// - Strategy timings (retry, bounded waits, cool-down)
// - Tracker cadence

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::agent::Strategy;
use crate::domain::fairness::DEFAULT_FAIRNESS_THRESHOLD;

pub const API_VERSION: &str = "contend.dev/v1";
pub const KIND: &str = "Simulation";
pub const CONFIG_PATH_ENV: &str = "CONTEND_CONFIG_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid apiVersion: '{0}'. Must be '{API_VERSION}'")]
    ApiVersion(String),

    #[error("Invalid kind: '{0}'. Must be '{KIND}'")]
    Kind(String),

    #[error("population must be at least 2, got {0}")]
    PopulationTooSmall(usize),

    #[error("strategy counts ({balanced} balanced + {ordered} ordered + {voracious} voracious = {total}) must sum to the population ({population})")]
    StrategyCountMismatch {
        balanced: usize,
        ordered: usize,
        voracious: usize,
        total: usize,
        population: usize,
    },

    #[error("fairness threshold must be at least 1")]
    ZeroThreshold,

    #[error("{field} must be a positive duration")]
    NonPositiveDuration { field: &'static str },

    #[error("invalid service distribution (mean {mean}, std dev {std_dev}): {reason}")]
    InvalidServiceDistribution {
        mean: f64,
        std_dev: f64,
        reason: String,
    },

    #[error("invalid value '{value}' for {variable}")]
    InvalidOverride { variable: &'static str, value: String },

    #[error("failed to read configuration at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level Kubernetes-style simulation manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationManifest {
    /// API version (must be "contend.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "Simulation")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: SimulationSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Everything needed to build a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSpec {
    /// Number of agents, which is also the number of resources.
    pub population: usize,

    pub strategies: StrategyMix,

    #[serde(default)]
    pub layout: Layout,

    /// Seed for the shuffled layout; random when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default)]
    pub fairness: FairnessConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(with = "humantime_serde", default = "default_run_duration")]
    pub run_duration: Duration,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub timings: StrategyTimings,
}

/// How many agents follow each strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StrategyMix {
    #[serde(default)]
    pub balanced: usize,
    #[serde(default)]
    pub ordered: usize,
    #[serde(default)]
    pub voracious: usize,
}

impl StrategyMix {
    pub fn total(&self) -> usize {
        self.balanced + self.ordered + self.voracious
    }

    pub fn count(&self, strategy: Strategy) -> usize {
        match strategy {
            Strategy::Balanced => self.balanced,
            Strategy::Ordered => self.ordered,
            Strategy::Voracious => self.voracious,
        }
    }

    pub fn only(strategy: Strategy, count: usize) -> Self {
        let mut mix = Self::default();
        match strategy {
            Strategy::Balanced => mix.balanced = count,
            Strategy::Ordered => mix.ordered = count,
            Strategy::Voracious => mix.voracious = count,
        }
        mix
    }

    /// Seats strategies around the ring according to `layout`.
    pub fn arrange(&self, layout: Layout, seed: Option<u64>) -> Vec<Strategy> {
        match layout {
            Layout::Grouped | Layout::Shuffled => {
                let mut seats: Vec<Strategy> = Strategy::ALL
                    .iter()
                    .flat_map(|s| std::iter::repeat_n(*s, self.count(*s)))
                    .collect();
                if layout == Layout::Shuffled {
                    let mut rng = match seed {
                        Some(seed) => StdRng::seed_from_u64(seed),
                        None => StdRng::from_rng(&mut rand::rng()),
                    };
                    seats.shuffle(&mut rng);
                }
                seats
            }
            Layout::Interleaved => {
                let mut remaining = Strategy::ALL.map(|s| self.count(s));
                let mut seats = Vec::with_capacity(self.total());
                while seats.len() < self.total() {
                    for (i, strategy) in Strategy::ALL.iter().enumerate() {
                        if remaining[i] > 0 {
                            remaining[i] -= 1;
                            seats.push(*strategy);
                        }
                    }
                }
                seats
            }
        }
    }
}

/// Seating order of strategies around the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Random permutation (seedable).
    #[default]
    Shuffled,
    /// Balanced block, then ordered, then voracious.
    Grouped,
    /// Round-robin over the strategies that still have seats to fill.
    Interleaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairnessConfig {
    /// Maximum lead over a neighbor before an agent must yield.
    #[serde(default = "default_threshold")]
    pub threshold: u64,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FAIRNESS_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Length of one time unit.
    #[serde(with = "humantime_serde")]
    pub time_unit: Duration,

    /// Center of the service time distribution, in time units.
    pub mean_units: f64,

    /// Standard deviation of the service time distribution, in time units.
    pub std_dev_units: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            time_unit: Duration::from_secs(1),
            mean_units: 2.0,
            std_dev_units: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Feed the live wait-for graph to the deadlock detector on every poll.
    #[serde(default)]
    pub verify_liveness: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            verify_liveness: false,
        }
    }
}

/// Fixed intervals used by the acquisition strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyTimings {
    /// Balanced: sleep after a cycle in which neither resource was free.
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,

    /// Balanced: bounded wait for the second resource.
    #[serde(with = "humantime_serde")]
    pub balanced_wait: Duration,

    /// Ordered: how long the first resource is held before reaching for the second.
    #[serde(with = "humantime_serde")]
    pub ordered_hold: Duration,

    /// Ordered: bounded wait for the second resource.
    #[serde(with = "humantime_serde")]
    pub ordered_wait: Duration,

    /// Voracious: bounded wait for each resource.
    #[serde(with = "humantime_serde")]
    pub voracious_wait: Duration,

    /// Sleep after every completed cycle.
    #[serde(with = "humantime_serde")]
    pub cool_down: Duration,
}

impl StrategyTimings {
    /// Default timings expressed relative to `unit`.
    pub fn for_unit(unit: Duration) -> Self {
        Self {
            retry_interval: unit,
            balanced_wait: unit / 2,
            ordered_hold: unit,
            ordered_wait: unit * 2,
            voracious_wait: unit * 2,
            cool_down: unit * 2,
        }
    }

    fn fields(&self) -> [(&'static str, Duration); 6] {
        [
            ("timings.retry_interval", self.retry_interval),
            ("timings.balanced_wait", self.balanced_wait),
            ("timings.ordered_hold", self.ordered_hold),
            ("timings.ordered_wait", self.ordered_wait),
            ("timings.voracious_wait", self.voracious_wait),
            ("timings.cool_down", self.cool_down),
        ]
    }
}

impl Default for StrategyTimings {
    fn default() -> Self {
        Self::for_unit(Duration::from_secs(1))
    }
}

impl Default for SimulationSpec {
    fn default() -> Self {
        Self {
            population: 10,
            strategies: StrategyMix {
                balanced: 3,
                ordered: 4,
                voracious: 3,
            },
            layout: Layout::Shuffled,
            seed: None,
            fairness: FairnessConfig::default(),
            service: ServiceConfig::default(),
            run_duration: default_run_duration(),
            tracker: TrackerConfig::default(),
            timings: StrategyTimings::default(),
        }
    }
}

impl SimulationSpec {
    /// A simulation whose every duration is scaled to `unit`, for a population of one strategy mix.
    pub fn scaled(population: usize, strategies: StrategyMix, unit: Duration) -> Self {
        Self {
            population,
            strategies,
            layout: Layout::Grouped,
            service: ServiceConfig {
                time_unit: unit,
                ..ServiceConfig::default()
            },
            run_duration: unit * 45,
            tracker: TrackerConfig {
                poll_interval: unit,
                verify_liveness: false,
            },
            timings: StrategyTimings::for_unit(unit),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population < 2 {
            return Err(ConfigError::PopulationTooSmall(self.population));
        }

        let total = self.strategies.total();
        if total != self.population {
            return Err(ConfigError::StrategyCountMismatch {
                balanced: self.strategies.balanced,
                ordered: self.strategies.ordered,
                voracious: self.strategies.voracious,
                total,
                population: self.population,
            });
        }

        if self.fairness.threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }

        let durations = [
            ("run_duration", self.run_duration),
            ("service.time_unit", self.service.time_unit),
            ("tracker.poll_interval", self.tracker.poll_interval),
        ];
        for (field, value) in durations.into_iter().chain(self.timings.fields()) {
            if value.is_zero() {
                return Err(ConfigError::NonPositiveDuration { field });
            }
        }

        if self.service.mean_units <= 0.0 {
            return Err(ConfigError::NonPositiveDuration {
                field: "service.mean_units",
            });
        }

        if !self.service.mean_units.is_finite()
            || !self.service.std_dev_units.is_finite()
            || self.service.std_dev_units < 0.0
        {
            return Err(ConfigError::InvalidServiceDistribution {
                mean: self.service.mean_units,
                std_dev: self.service.std_dev_units,
                reason: "mean and standard deviation must be finite, deviation non-negative"
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Strategy of every seat, in seat order.
    pub fn seating(&self) -> Vec<Strategy> {
        self.strategies.arrange(self.layout, self.seed)
    }
}

impl Default for SimulationManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "refectory".to_string(),
                labels: None,
            },
            spec: SimulationSpec::default(),
        }
    }
}

impl SimulationManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Discover configuration file using precedence order
    /// 1. CONTEND_CONFIG_PATH environment variable
    /// 2. ./contend-config.yaml (working directory)
    /// 3. ~/.contend/config.yaml (user home)
    /// 4. /etc/contend/config.yaml (Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./contend-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".contend").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/contend/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut manifest = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        manifest.apply_env_overrides()?;
        Ok(manifest)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        self.apply_overrides(lookup)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("CONTEND_RUN_DURATION") {
            self.spec.run_duration = humantime_serde::re::humantime::parse_duration(&value).map_err(|_| {
                ConfigError::InvalidOverride {
                    variable: "CONTEND_RUN_DURATION",
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = lookup("CONTEND_FAIRNESS_THRESHOLD") {
            self.spec.fairness.threshold =
                value.parse().map_err(|_| ConfigError::InvalidOverride {
                    variable: "CONTEND_FAIRNESS_THRESHOLD",
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup("CONTEND_SEED") {
            self.spec.seed = Some(value.parse().map_err(|_| ConfigError::InvalidOverride {
                variable: "CONTEND_SEED",
                value: value.clone(),
            })?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_version != API_VERSION {
            return Err(ConfigError::ApiVersion(self.api_version.clone()));
        }
        if self.kind != KIND {
            return Err(ConfigError::Kind(self.kind.clone()));
        }
        self.spec.validate()
    }
}

fn default_run_duration() -> Duration {
    Duration::from_secs(45)
}

fn default_threshold() -> u64 {
    DEFAULT_FAIRNESS_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest_is_valid() {
        let manifest = SimulationManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.population, 10);
        assert_eq!(manifest.spec.strategies.total(), 10);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip_with_humantime_durations() {
        let yaml = r#"
apiVersion: contend.dev/v1
kind: Simulation
metadata:
  name: small-table
spec:
  population: 4
  strategies: { ordered: 2, voracious: 2 }
  layout: interleaved
  seed: 11
  fairness: { threshold: 2 }
  service: { time_unit: 100ms, mean_units: 1.5, std_dev_units: 0.5 }
  run_duration: 20s
  tracker: { poll_interval: 250ms, verify_liveness: true }
"#;
        let manifest = SimulationManifest::from_yaml_str(yaml).unwrap();
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.metadata.name, "small-table");
        assert_eq!(manifest.spec.layout, Layout::Interleaved);
        assert_eq!(manifest.spec.service.time_unit, Duration::from_millis(100));
        assert_eq!(manifest.spec.run_duration, Duration::from_secs(20));
        assert!(manifest.spec.tracker.verify_liveness);
        // Timings fall back to their defaults when omitted.
        assert_eq!(manifest.spec.timings, StrategyTimings::default());

        let yaml = serde_yaml::to_string(&manifest).unwrap();
        let parsed = SimulationManifest::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec, manifest.spec);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contend-config.yaml");
        SimulationManifest::default().to_yaml_file(&path).unwrap();

        let loaded = SimulationManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.spec.population, 10);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = SimulationManifest::from_yaml_file("/nonexistent/contend.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_validation() {
        let mut spec = SimulationSpec::default();

        spec.strategies.balanced += 1;
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::StrategyCountMismatch { total: 11, population: 10, .. })
        ));
        spec.strategies.balanced -= 1;

        spec.fairness.threshold = 0;
        assert!(matches!(spec.validate(), Err(ConfigError::ZeroThreshold)));
        spec.fairness.threshold = 3;

        spec.timings.cool_down = Duration::ZERO;
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::NonPositiveDuration { field: "timings.cool_down" })
        ));
        spec.timings.cool_down = Duration::from_secs(2);

        for mean in [0.0, -5.0] {
            spec.service.mean_units = mean;
            assert!(matches!(
                spec.validate(),
                Err(ConfigError::NonPositiveDuration { field: "service.mean_units" })
            ));
        }
        spec.service.mean_units = f64::NAN;
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::InvalidServiceDistribution { .. })
        ));
        spec.service.mean_units = 2.0;
        assert!(spec.validate().is_ok());

        spec.population = 1;
        spec.strategies = StrategyMix::only(Strategy::Balanced, 1);
        assert!(matches!(spec.validate(), Err(ConfigError::PopulationTooSmall(1))));

        let mut manifest = SimulationManifest::default();
        manifest.kind = "Dinner".to_string();
        assert!(matches!(manifest.validate(), Err(ConfigError::Kind(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut manifest = SimulationManifest::default();
        let vars = HashMap::from([
            ("CONTEND_RUN_DURATION", "90s"),
            ("CONTEND_FAIRNESS_THRESHOLD", "5"),
            ("CONTEND_SEED", "99"),
        ]);
        manifest
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(manifest.spec.run_duration, Duration::from_secs(90));
        assert_eq!(manifest.spec.fairness.threshold, 5);
        assert_eq!(manifest.spec.seed, Some(99));

        let err = manifest
            .apply_overrides(|key| (key == "CONTEND_SEED").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { variable: "CONTEND_SEED", .. }));
    }

    #[test]
    fn test_layouts() {
        let mix = StrategyMix {
            balanced: 1,
            ordered: 2,
            voracious: 2,
        };
        use Strategy::*;
        assert_eq!(
            mix.arrange(Layout::Grouped, None),
            vec![Balanced, Ordered, Ordered, Voracious, Voracious]
        );
        assert_eq!(
            mix.arrange(Layout::Interleaved, None),
            vec![Balanced, Ordered, Voracious, Ordered, Voracious]
        );

        let shuffled = mix.arrange(Layout::Shuffled, Some(3));
        assert_eq!(shuffled, mix.arrange(Layout::Shuffled, Some(3)));
        assert_eq!(shuffled.iter().filter(|s| **s == Voracious).count(), 2);
        assert_eq!(shuffled.len(), 5);
    }
}
