//! Core data models for the host collector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric tracked by the anomaly detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricKind {
    Cpu,
    Memory,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "CPU",
            MetricKind::Memory => "MEMORY",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anomaly severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A usage spike raised by the detector for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub metric: MetricKind,
    pub severity: Severity,
    /// Kept for logging and metrics; not part of the wire record
    #[serde(skip)]
    pub z_score: f64,
    pub message: String,
}

/// Per-tick system statistics, emitted as `STATS:`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub cpu: f64,
    pub memory: f64,
    /// Received KiB/s
    pub network_in: f64,
    /// Sent KiB/s
    pub network_out: f64,
    pub anomalies: Vec<Anomaly>,
}

/// One process entry of a `PROCS:` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub username: String,
}

/// One partition entry of a `DISK:` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

/// CPU and memory utilisation read at one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuMemSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Cumulative network byte counters and the wall-clock time they were read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkCounterSnapshot {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub timestamp: DateTime<Utc>,
}

/// Round to one decimal place, as every percentage and rate on the wire is
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
