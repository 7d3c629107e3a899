//! Configuration loading from hashbench.toml
//!
//! Measurement knobs can be specified in a `hashbench.toml` file in the project root.
//! The configuration is discovered by walking up from the current directory, or
//! named explicitly with `HASHBENCH_CONFIG`. Feature selection stays on the
//! command line; nothing here changes which variants or sizes run.

use hashbench_core::ClockSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "HASHBENCH_CONFIG";

/// File name searched for during discovery
pub const CONFIG_FILE: &str = "hashbench.toml";

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// A duration string could not be understood
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),
}

/// hashbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HashbenchConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Overhead calibration configuration
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

/// Runner configuration for the benchmark sweep
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerConfig {
    /// Warmup duration per variant and size (e.g., "50ms")
    #[serde(default = "default_warmup")]
    pub warmup_time: String,
    /// Measurement budget per variant and size (e.g., "200ms")
    #[serde(default = "default_measurement")]
    pub measurement_time: String,
    /// Batches collected per variant and size
    #[serde(default = "default_samples")]
    pub samples: u32,
    /// Seed for the benchmark key buffers
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Pin the benchmarking thread to the CPU it starts on
    #[serde(default = "default_pin_cpu")]
    pub pin_cpu: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            warmup_time: default_warmup(),
            measurement_time: default_measurement(),
            samples: default_samples(),
            seed: default_seed(),
            pin_cpu: default_pin_cpu(),
        }
    }
}

fn default_warmup() -> String {
    "50ms".to_string()
}
fn default_measurement() -> String {
    "200ms".to_string()
}
fn default_samples() -> u32 {
    32
}
fn default_seed() -> u64 {
    42
}
fn default_pin_cpu() -> bool {
    true
}

/// Clock overhead calibration configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationConfig {
    /// Give up calibrating after this long (e.g., "2s")
    #[serde(default = "default_budget")]
    pub budget: String,
    /// Times the best overhead must repeat to count as converged
    #[serde(default = "default_convergence")]
    pub convergence: u32,
    /// Empty probes per calibration loop
    #[serde(default = "default_loops")]
    pub loops: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            convergence: default_convergence(),
            loops: default_loops(),
        }
    }
}

fn default_budget() -> String {
    "2s".to_string()
}
fn default_convergence() -> u32 {
    7
}
fn default_loops() -> u32 {
    64
}

impl HashbenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Find the configuration file: `HASHBENCH_CONFIG` first, then walk up
    /// from the current directory.
    pub fn locate() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Discover and load configuration. A missing file yields the defaults;
    /// an unreadable or malformed one is logged and also yields the defaults.
    pub fn discover() -> Self {
        let Some(path) = Self::locate() else {
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring configuration file");
                Self::default()
            }
        }
    }

    /// Translate into measurement settings; invalid durations fall back to their defaults.
    pub fn clock_settings(&self) -> ClockSettings {
        let defaults = ClockSettings::default();
        let duration = |value: &str, fallback: Duration| {
            Self::parse_duration(value).unwrap_or_else(|e| {
                warn!(error = %e, "using default");
                fallback
            })
        };

        ClockSettings {
            warmup: duration(&self.runner.warmup_time, defaults.warmup),
            measurement: duration(&self.runner.measurement_time, defaults.measurement),
            samples: self.runner.samples.max(1),
            pin_cpu: self.runner.pin_cpu,
            calibration_budget: duration(&self.calibration.budget, defaults.calibration_budget),
            convergence: self.calibration.convergence.max(1),
            calibration_loops: self.calibration.loops.max(1),
        }
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# hashbench configuration

[runner]
# Warmup per variant and key size
warmup_time = "50ms"
# Measurement budget per variant and key size
measurement_time = "200ms"
# Batches collected per variant and key size
samples = 32
# Seed for the random key buffers
seed = 42
# Pin the benchmarking thread to its current CPU (Linux only)
pin_cpu = true

[calibration]
# Give up calibrating clock overhead after this long
budget = "2s"
# Repeats of the best overhead that count as converged
convergence = 7
# Empty probes per calibration loop
loops = 64
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m")
    pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::InvalidDuration(s.to_string()));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidDuration(s.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidDuration(s.to_string()));
        }

        let multiplier: f64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" | "min" => 60e9,
            _ => return Err(ConfigError::InvalidDuration(s.to_string())),
        };

        Ok(Duration::from_nanos((value * multiplier) as u64))
    }
}
