//! Anomaly detection for host resource usage
//!
//! This module provides:
//! - Fixed-capacity rolling windows of recent CPU and memory samples
//! - Z-score spike detection against those windows

mod detector;
mod window;

pub use detector::{
    AnomalyDetector, ConfigError, DetectionPolicy, DetectorConfig, DEFAULT_CRITICAL_Z,
    DEFAULT_NOISE_FLOOR, DEFAULT_WARNING_Z,
};
pub use window::{RollingWindow, WindowStatistics, DEFAULT_WINDOW_SIZE, MIN_SAMPLES_FOR_DETECTION};
