//! CPU and memory spike detection
//!
//! Keeps one rolling window per metric and classifies each new sample by its
//! z-score against the window as it stood before the sample arrived. Only
//! high-side spikes are reported; drops below the baseline are ignored.

use super::window::{RollingWindow, WindowStatistics, DEFAULT_WINDOW_SIZE, MIN_SAMPLES_FOR_DETECTION};
use crate::models::{Anomaly, MetricKind, Severity};
use serde::Deserialize;
use thiserror::Error;

/// Standard deviation at or below which a metric is considered flat
pub const DEFAULT_NOISE_FLOOR: f64 = 0.5;

/// Z-score above which a WARNING is raised (tiered policy only)
pub const DEFAULT_WARNING_Z: f64 = 2.0;

/// Z-score above which a CRITICAL anomaly is raised
pub const DEFAULT_CRITICAL_Z: f64 = 3.0;

/// Which severity tiers the detector reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPolicy {
    /// WARNING for `warning_z < z <= critical_z`, CRITICAL above
    #[default]
    Tiered,
    /// CRITICAL only
    CriticalOnly,
}

impl DetectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionPolicy::Tiered => "tiered",
            DetectionPolicy::CriticalOnly => "critical_only",
        }
    }
}

/// Invalid detector settings
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("window size must be greater than zero")]
    ZeroWindow,

    #[error("minimum sample count must be greater than zero")]
    ZeroMinSamples,

    #[error("minimum sample count {min_samples} exceeds window size {window_size}")]
    MinSamplesExceedWindow {
        min_samples: usize,
        window_size: usize,
    },

    #[error("{name} must be a finite non-negative number, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("critical z-score {critical} is below warning z-score {warning}")]
    ThresholdOrder { warning: f64, critical: f64 },
}

/// Anomaly detector settings
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Samples retained per metric
    pub window_size: usize,
    /// Warm-up floor before any anomaly can be raised
    pub min_samples: usize,
    pub noise_floor: f64,
    pub warning_z: f64,
    pub critical_z: f64,
    pub policy: DetectionPolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            min_samples: MIN_SAMPLES_FOR_DETECTION,
            noise_floor: DEFAULT_NOISE_FLOOR,
            warning_z: DEFAULT_WARNING_Z,
            critical_z: DEFAULT_CRITICAL_Z,
            policy: DetectionPolicy::Tiered,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.min_samples == 0 {
            return Err(ConfigError::ZeroMinSamples);
        }
        if self.min_samples > self.window_size {
            return Err(ConfigError::MinSamplesExceedWindow {
                min_samples: self.min_samples,
                window_size: self.window_size,
            });
        }
        for (name, value) in [
            ("noise_floor", self.noise_floor),
            ("warning_z", self.warning_z),
            ("critical_z", self.critical_z),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if self.critical_z < self.warning_z {
            return Err(ConfigError::ThresholdOrder {
                warning: self.warning_z,
                critical: self.critical_z,
            });
        }
        Ok(())
    }
}

/// Detects CPU and memory usage spikes
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: DetectorConfig,
    cpu_window: RollingWindow,
    mem_window: RollingWindow,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            cpu_window: RollingWindow::new(config.window_size),
            mem_window: RollingWindow::new(config.window_size),
            config,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn cpu_window(&self) -> &RollingWindow {
        &self.cpu_window
    }

    pub fn mem_window(&self) -> &RollingWindow {
        &self.mem_window
    }

    /// Current statistics for one metric, `None` during warm-up
    pub fn statistics(&self, metric: MetricKind) -> Option<WindowStatistics> {
        self.window(metric).statistics(self.config.min_samples)
    }

    /// Classify the new samples, then add them to their windows
    ///
    /// Returns the CPU anomaly first and the memory anomaly second when both
    /// fire. The windows are updated whether or not anything was raised.
    pub fn check(&mut self, cpu: f64, mem: f64) -> Vec<Anomaly> {
        let anomalies: Vec<Anomaly> = [(MetricKind::Cpu, cpu), (MetricKind::Memory, mem)]
            .into_iter()
            .filter_map(|(metric, value)| self.evaluate(metric, value))
            .collect();

        self.cpu_window.push(cpu);
        self.mem_window.push(mem);

        anomalies
    }

    fn window(&self, metric: MetricKind) -> &RollingWindow {
        match metric {
            MetricKind::Cpu => &self.cpu_window,
            MetricKind::Memory => &self.mem_window,
        }
    }

    fn evaluate(&self, metric: MetricKind, value: f64) -> Option<Anomaly> {
        let stats = self.statistics(metric)?;

        if stats.std_dev <= self.config.noise_floor {
            return None;
        }

        let z_score = (value - stats.mean) / stats.std_dev;
        let severity = self.classify(z_score)?;

        Some(Anomaly {
            metric,
            severity,
            z_score,
            message: spike_message(metric, severity, z_score),
        })
    }

    fn classify(&self, z_score: f64) -> Option<Severity> {
        if z_score > self.config.critical_z {
            Some(Severity::Critical)
        } else if z_score > self.config.warning_z
            && self.config.policy == DetectionPolicy::Tiered
        {
            Some(Severity::Warning)
        } else {
            None
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

fn spike_message(metric: MetricKind, severity: Severity, z_score: f64) -> String {
    match (metric, severity) {
        (MetricKind::Cpu, Severity::Critical) => format!("CPU Spike! (Z: {:.1})", z_score),
        (MetricKind::Memory, Severity::Critical) => format!("Memory Surge! (Z: {:.1})", z_score),
        (MetricKind::Cpu, Severity::Warning) => format!("CPU usage elevated (Z: {:.1})", z_score),
        (MetricKind::Memory, Severity::Warning) => {
            format!("Memory usage elevated (Z: {:.1})", z_score)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Alternating mean-1/mean+1 values: mean exactly `mean`, std exactly 1
    fn feed_unit_variance(detector: &mut AnomalyDetector, mean: f64, mem: f64, n: usize) {
        for i in 0..n {
            let cpu = if i % 2 == 0 { mean - 1.0 } else { mean + 1.0 };
            assert!(detector.check(cpu, mem).is_empty());
        }
    }

    #[test]
    fn test_no_anomaly_during_warm_up() {
        let mut detector = AnomalyDetector::default();

        for i in 0..MIN_SAMPLES_FOR_DETECTION {
            let value = if i % 2 == 0 { 0.0 } else { 100.0 };
            assert!(detector.check(value, value).is_empty());
        }
        assert_eq!(detector.cpu_window().len(), MIN_SAMPLES_FOR_DETECTION);
    }

    #[test]
    fn test_flat_signal_suppressed() {
        let mut detector = AnomalyDetector::default();
        for _ in 0..60 {
            detector.check(42.0, 42.0);
        }

        assert!(detector.check(42.0, 42.0).is_empty());
        // Even a huge jump is ignored when the baseline has no variance
        assert!(detector.check(100.0, 100.0).is_empty());
    }

    #[test]
    fn test_critical_cpu_spike() {
        let mut detector = AnomalyDetector::default();
        feed_unit_variance(&mut detector, 10.0, 30.0, 20);

        let stats = detector.statistics(MetricKind::Cpu).unwrap();
        assert!((stats.mean - 10.0).abs() < 1e-9);
        assert!((stats.std_dev - 1.0).abs() < 1e-9);

        let anomalies = detector.check(14.0, 30.0);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].metric, MetricKind::Cpu);
        assert_eq!(anomalies[0].severity, Severity::Critical);
        assert!((anomalies[0].z_score - 4.0).abs() < 1e-9);
        assert_eq!(anomalies[0].message, "CPU Spike! (Z: 4.0)");
    }

    #[test]
    fn test_memory_evaluated_independently() {
        let mut detector = AnomalyDetector::default();
        for i in 0..20 {
            let cpu = if i % 2 == 0 { 9.0 } else { 11.0 };
            let mem = if i % 2 == 0 { 49.0 } else { 51.0 };
            detector.check(cpu, mem);
        }

        let anomalies = detector.check(14.0, 55.0);
        assert_eq!(anomalies.len(), 2);
        assert_eq!(anomalies[0].metric, MetricKind::Cpu);
        assert_eq!(anomalies[1].metric, MetricKind::Memory);
        assert_eq!(anomalies[1].message, "Memory Surge! (Z: 5.0)");
    }

    #[test]
    fn test_warning_tier() {
        let mut detector = AnomalyDetector::default();
        feed_unit_variance(&mut detector, 10.0, 30.0, 20);

        let anomalies = detector.check(12.5, 30.0);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::Warning);
        assert_eq!(anomalies[0].message, "CPU usage elevated (Z: 2.5)");
    }

    #[test]
    fn test_critical_only_policy_skips_warning() {
        let mut detector = AnomalyDetector::new(DetectorConfig {
            policy: DetectionPolicy::CriticalOnly,
            ..DetectorConfig::default()
        });
        feed_unit_variance(&mut detector, 10.0, 30.0, 20);

        assert!(detector.check(12.5, 30.0).is_empty());
    }

    #[test]
    fn test_z_exactly_at_threshold_is_not_critical() {
        let mut detector = AnomalyDetector::default();
        feed_unit_variance(&mut detector, 10.0, 30.0, 20);

        let anomalies = detector.check(13.0, 30.0);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::Warning);
    }

    #[test]
    fn test_negative_spike_ignored() {
        let mut detector = AnomalyDetector::default();
        feed_unit_variance(&mut detector, 50.0, 30.0, 20);

        assert!(detector.check(0.0, 30.0).is_empty());
    }

    #[test]
    fn test_sample_not_compared_against_itself() {
        let mut detector = AnomalyDetector::default();
        feed_unit_variance(&mut detector, 10.0, 30.0, 20);

        let before = detector.statistics(MetricKind::Cpu).unwrap();
        let anomalies = detector.check(14.0, 30.0);
        assert!((anomalies[0].z_score - (14.0 - before.mean) / before.std_dev).abs() < 1e-9);
        assert_eq!(detector.cpu_window().len(), 21);
    }

    #[test]
    fn test_windows_capped_at_capacity() {
        let mut detector = AnomalyDetector::default();
        for i in 0..200 {
            detector.check(i as f64, i as f64);
        }
        assert_eq!(detector.cpu_window().len(), DEFAULT_WINDOW_SIZE);
        assert_eq!(detector.mem_window().len(), DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn test_evicted_outlier_no_longer_in_baseline() {
        let mut detector = AnomalyDetector::default();
        detector.check(1000.0, 0.0);
        for _ in 0..59 {
            detector.check(0.0, 0.0);
        }
        assert!(detector.statistics(MetricKind::Cpu).unwrap().mean > 16.0);

        detector.check(0.0, 0.0);
        let stats = detector.statistics(MetricKind::Cpu).unwrap();
        assert!(stats.mean.abs() < 1e-9);
    }

    #[test]
    fn test_config_validation() {
        assert!(DetectorConfig::default().validate().is_ok());

        let zero = DetectorConfig {
            window_size: 0,
            ..DetectorConfig::default()
        };
        assert_eq!(zero.validate(), Err(ConfigError::ZeroWindow));

        let too_many = DetectorConfig {
            window_size: 5,
            ..DetectorConfig::default()
        };
        assert!(matches!(
            too_many.validate(),
            Err(ConfigError::MinSamplesExceedWindow { .. })
        ));

        let inverted = DetectorConfig {
            warning_z: 4.0,
            critical_z: 3.0,
            ..DetectorConfig::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigError::ThresholdOrder { .. })
        ));

        let nan = DetectorConfig {
            noise_floor: f64::NAN,
            ..DetectorConfig::default()
        };
        assert!(matches!(
            nan.validate(),
            Err(ConfigError::InvalidThreshold { name: "noise_floor", .. })
        ));
    }
}
