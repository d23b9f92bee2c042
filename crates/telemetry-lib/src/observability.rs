//! Observability infrastructure for the collector
//!
//! Provides:
//! - Prometheus metrics (tick latency, anomalies, fetch errors, report sizes)
//! - Structured JSON logging with tracing
//!
//! All log output goes to the diagnostic stream; stdout carries only the
//! tagged record protocol.

use crate::models::{Anomaly, Severity};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for tick latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<CollectorMetricsInner> = OnceLock::new();

struct CollectorMetricsInner {
    ticks_total: IntCounter,
    tick_errors_total: IntCounter,
    tick_latency_seconds: Histogram,
    anomalies_detected: IntCounterVec,
    fetch_errors: IntCounterVec,
    processes_reported: IntGauge,
    disks_reported: IntGauge,
}

impl CollectorMetricsInner {
    fn new() -> Self {
        Self {
            ticks_total: register_int_counter!(
                "host_collector_ticks_total",
                "Sampling ticks completed"
            )
            .expect("Failed to register ticks_total"),

            tick_errors_total: register_int_counter!(
                "host_collector_tick_errors_total",
                "Sampling ticks that failed and were retried"
            )
            .expect("Failed to register tick_errors_total"),

            tick_latency_seconds: register_histogram!(
                "host_collector_tick_latency_seconds",
                "Time spent sampling, detecting and emitting one tick",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            anomalies_detected: register_int_counter_vec!(
                "host_collector_anomalies_detected_total",
                "Usage spikes raised by the anomaly detector",
                &["metric", "severity"]
            )
            .expect("Failed to register anomalies_detected"),

            fetch_errors: register_int_counter_vec!(
                "host_collector_fetch_errors_total",
                "Whole-fetch failures per metric source",
                &["source"]
            )
            .expect("Failed to register fetch_errors"),

            processes_reported: register_int_gauge!(
                "host_collector_processes_reported",
                "Entries in the most recent PROCS record"
            )
            .expect("Failed to register processes_reported"),

            disks_reported: register_int_gauge!(
                "host_collector_disks_reported",
                "Entries in the most recent DISK record"
            )
            .expect("Failed to register disks_reported"),
        }
    }
}

/// Collector metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct CollectorMetrics {
    _private: (),
}

impl Default for CollectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(CollectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CollectorMetricsInner {
        GLOBAL_METRICS.get_or_init(CollectorMetricsInner::new)
    }

    /// Record a completed tick and how long it took
    pub fn observe_tick(&self, duration_secs: f64) {
        self.inner().ticks_total.inc();
        self.inner().tick_latency_seconds.observe(duration_secs);
    }

    pub fn inc_tick_errors(&self) {
        self.inner().tick_errors_total.inc();
    }

    pub fn inc_anomaly(&self, anomaly: &Anomaly) {
        self.inner()
            .anomalies_detected
            .with_label_values(&[anomaly.metric.as_str(), anomaly.severity.as_str()])
            .inc();
    }

    pub fn inc_fetch_errors(&self, source: &str) {
        self.inner().fetch_errors.with_label_values(&[source]).inc();
    }

    pub fn set_processes_reported(&self, count: usize) {
        self.inner().processes_reported.set(count as i64);
    }

    pub fn set_disks_reported(&self, count: usize) {
        self.inner().disks_reported.set(count as i64);
    }

    pub fn ticks_total(&self) -> u64 {
        self.inner().ticks_total.get()
    }

    pub fn fetch_errors(&self, source: &str) -> u64 {
        self.inner().fetch_errors.with_label_values(&[source]).get()
    }
}

/// Structured logger for collector events
#[derive(Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Log a detected usage spike
    pub fn log_anomaly(&self, tick: u64, anomaly: &Anomaly) {
        match anomaly.severity {
            Severity::Critical => {
                warn!(
                    event = "anomaly_detected",
                    host = %self.host,
                    tick = tick,
                    metric = %anomaly.metric,
                    severity = %anomaly.severity,
                    z_score = anomaly.z_score,
                    details = %anomaly.message,
                    "Critical anomaly detected"
                );
            }
            Severity::Warning => {
                info!(
                    event = "anomaly_detected",
                    host = %self.host,
                    tick = tick,
                    metric = %anomaly.metric,
                    severity = %anomaly.severity,
                    z_score = anomaly.z_score,
                    details = %anomaly.message,
                    "Anomaly detected"
                );
            }
        }
    }

    /// Log a whole-fetch failure that was replaced by an empty record
    pub fn log_fetch_failure(&self, tick: u64, source: &str, error: &dyn std::error::Error) {
        warn!(
            event = "fetch_failed",
            host = %self.host,
            tick = tick,
            source = %source,
            error = %error,
            "Fetch failed, emitting empty list"
        );
    }

    /// Log collector startup
    pub fn log_startup(&self, version: &str, window_size: usize, policy: &str) {
        info!(
            event = "collector_started",
            host = %self.host,
            collector_version = %version,
            window_size = window_size,
            policy = %policy,
            "Host collector started"
        );
    }

    /// Log collector shutdown
    pub fn log_shutdown(&self, reason: &str, ticks: u64) {
        info!(
            event = "collector_shutdown",
            host = %self.host,
            reason = %reason,
            ticks = ticks,
            "Host collector shutting down"
        );
    }
}
