//! Host telemetry collection library
//!
//! This crate provides the core functionality for:
//! - Sampling CPU, memory, network, process and disk metrics
//! - Z-score anomaly detection on the CPU and memory streams
//! - The multi-cadence sampling scheduler
//! - The tagged JSON line output protocol
//! - Health checks and observability

pub mod anomaly;
pub mod collector;
pub mod health;
pub mod models;
pub mod observability;
pub mod output;

pub use anomaly::{AnomalyDetector, DetectionPolicy, DetectorConfig};
pub use collector::{Providers, SamplingScheduler, SamplingSchedulerBuilder, SchedulerConfig};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{CollectorMetrics, StructuredLogger};
pub use output::{LineSink, MemorySink, Record, RecordSink};
