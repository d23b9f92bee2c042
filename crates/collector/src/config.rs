//! Collector configuration
//!
//! Read from `COLLECTOR_*` environment variables; every setting has a
//! default, so an empty environment yields the standard 1 s / 3 / 10 tick
//! collector with a 60-sample detector window.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use telemetry_lib::anomaly::{
    DetectionPolicy, DetectorConfig, DEFAULT_CRITICAL_Z, DEFAULT_NOISE_FLOOR, DEFAULT_WARNING_Z,
    DEFAULT_WINDOW_SIZE, MIN_SAMPLES_FOR_DETECTION,
};
use telemetry_lib::collector::{Cadence, SchedulerConfig};

const ENV_PREFIX: &str = "COLLECTOR";

/// Collector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Host name attached to log events
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// Samples kept per metric for the anomaly baseline
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Samples required before anomalies can be raised
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    #[serde(default = "default_noise_floor")]
    pub noise_floor: f64,

    #[serde(default = "default_warning_z")]
    pub warning_z: f64,

    #[serde(default = "default_critical_z")]
    pub critical_z: f64,

    /// `tiered` or `critical_only`
    #[serde(default)]
    pub policy: DetectionPolicy,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Ticks between PROCS records; 0 disables them
    #[serde(default = "default_process_every")]
    pub process_every: u64,

    /// Ticks between DISK records; 0 disables them
    #[serde(default = "default_disk_every")]
    pub disk_every: u64,

    #[serde(default = "default_process_limit")]
    pub process_limit: usize,

    /// Port for the health/metrics endpoint; 0 disables it
    #[serde(default)]
    pub api_port: u16,
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_min_samples() -> usize {
    MIN_SAMPLES_FOR_DETECTION
}

fn default_noise_floor() -> f64 {
    DEFAULT_NOISE_FLOOR
}

fn default_warning_z() -> f64 {
    DEFAULT_WARNING_Z
}

fn default_critical_z() -> f64 {
    DEFAULT_CRITICAL_Z
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_error_backoff_ms() -> u64 {
    1000
}

fn default_process_every() -> u64 {
    3
}

fn default_disk_every() -> u64 {
    10
}

fn default_process_limit() -> usize {
    20
}

impl CollectorConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration from an explicit variable map instead of the
    /// process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
            .context("Invalid COLLECTOR_* environment variable")?;

        config.detector_config().validate()?;
        if config.tick_interval_ms == 0 {
            anyhow::bail!("COLLECTOR_TICK_INTERVAL_MS must be greater than zero");
        }

        Ok(config)
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            window_size: self.window_size,
            min_samples: self.min_samples,
            noise_floor: self.noise_floor,
            warning_z: self.warning_z,
            critical_z: self.critical_z,
            policy: self.policy,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            error_backoff: Duration::from_millis(self.error_backoff_ms),
            process_cadence: Cadence::every(self.process_every),
            disk_cadence: Cadence::every(self.disk_every),
            process_limit: self.process_limit,
        }
    }
}
