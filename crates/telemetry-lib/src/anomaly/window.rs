//! Fixed-capacity rolling window of recent samples
//!
//! Holds the most recent N observations of one metric in chronological order
//! and derives mean and population standard deviation from them.

use std::collections::VecDeque;

/// Default window capacity (one minute at one sample per second)
pub const DEFAULT_WINDOW_SIZE: usize = 60;

/// Minimum samples required before statistics are defined
pub const MIN_SAMPLES_FOR_DETECTION: usize = 10;

/// Mean and standard deviation of a window's current contents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStatistics {
    pub mean: f64,
    /// Population standard deviation (denominator = sample count)
    pub std_dev: f64,
    pub count: usize,
}

/// Ring buffer of the most recent samples for one metric
///
/// Inserting into a full window evicts the oldest sample first, so the
/// window always reflects the latest `capacity` observations.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    /// Create an empty window holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when full
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples oldest first
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Statistics over the current contents, or `None` below `min_samples`
    pub fn statistics(&self, min_samples: usize) -> Option<WindowStatistics> {
        let count = self.samples.len();
        if count == 0 || count < min_samples {
            return None;
        }

        let mean = self.samples.iter().sum::<f64>() / count as f64;

        // Two-pass population variance
        let variance = self
            .samples
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / count as f64;

        Some(WindowStatistics {
            mean,
            std_dev: variance.sqrt(),
            count,
        })
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut window = RollingWindow::new(5);
        for i in 0..12 {
            window.push(i as f64);
        }

        assert_eq!(window.len(), 5);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_insufficient_samples() {
        let mut window = RollingWindow::default();
        for _ in 0..MIN_SAMPLES_FOR_DETECTION - 1 {
            window.push(50.0);
        }
        assert!(window.statistics(MIN_SAMPLES_FOR_DETECTION).is_none());

        window.push(50.0);
        assert!(window.statistics(MIN_SAMPLES_FOR_DETECTION).is_some());
    }

    #[test]
    fn test_population_std_dev() {
        let mut window = RollingWindow::new(10);
        // Values 2,4,4,4,5,5,7,9 have population std dev exactly 2
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            window.push(v);
        }

        let stats = window.statistics(1).unwrap();
        assert!((stats.mean - 5.0).abs() < 1e-9);
        assert!((stats.std_dev - 2.0).abs() < 1e-9);
        assert_eq!(stats.count, 8);
    }

    #[test]
    fn test_evicted_sample_leaves_statistics() {
        let mut window = RollingWindow::new(60);
        window.push(1000.0);
        for _ in 0..59 {
            window.push(0.0);
        }
        let before = window.statistics(10).unwrap();
        assert!(before.mean > 16.0);

        window.push(0.0);
        let after = window.statistics(10).unwrap();
        assert!(after.mean.abs() < 1e-9);
        assert!(after.std_dev.abs() < 1e-9);
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        let mut window = RollingWindow::new(0);
        window.push(1.0);
        assert!(window.is_empty());
        assert!(window.statistics(0).is_none());
    }
}
