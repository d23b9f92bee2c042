//! Multi-cadence sampling scheduler
//!
//! Drives the collector from a single logical clock. Every tick samples CPU,
//! memory and network and emits a STATS record; processes and disks are
//! sampled on their own, slower cadences. All state (tick counter, detector
//! windows, last network snapshot) is owned here and touched by one task.

use super::{rank_top_processes, NetworkRate, ProviderError, Providers};
use crate::anomaly::{AnomalyDetector, DetectorConfig};
use crate::health::{components, HealthRegistry};
use crate::models::{NetworkCounterSnapshot, StatsRecord};
use crate::observability::{CollectorMetrics, StructuredLogger};
use crate::output::{EmitError, Record, RecordSink};
use anyhow::Result;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default tick period
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Pause before retrying a failed tick
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Processes are reported every this many ticks
pub const DEFAULT_PROCESS_EVERY: u64 = 3;

/// Disks are reported every this many ticks
pub const DEFAULT_DISK_EVERY: u64 = 10;

/// Maximum entries in a PROCS record
pub const DEFAULT_PROCESS_LIMIT: usize = 20;

/// Period, in ticks, at which a producer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    every: u64,
}

impl Cadence {
    /// Fire on every `every`-th tick, starting at tick 0; zero never fires
    pub const fn every(every: u64) -> Self {
        Self { every }
    }

    pub const fn never() -> Self {
        Self { every: 0 }
    }

    pub fn period(&self) -> u64 {
        self.every
    }

    pub fn fires_on(&self, tick: u64) -> bool {
        self.every != 0 && tick % self.every == 0
    }
}

/// Configuration for the sampling scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed sleep after each tick (default: 1 second)
    pub tick_interval: Duration,
    /// Sleep after a failed tick before retrying it (default: 1 second)
    pub error_backoff: Duration,
    pub process_cadence: Cadence,
    pub disk_cadence: Cadence,
    /// Cap on PROCS entries (default: 20)
    pub process_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            process_cadence: Cadence::every(DEFAULT_PROCESS_EVERY),
            disk_cadence: Cadence::every(DEFAULT_DISK_EVERY),
            process_limit: DEFAULT_PROCESS_LIMIT,
        }
    }
}

/// Lifecycle of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Built but not yet looping
    Idle,
    /// Looping; tick failures are retried without leaving this state
    Running,
    /// Stopped by a shutdown signal
    Stopped,
}

/// A tick that could not complete; the same tick is retried after a pause
#[derive(Debug, Error)]
pub enum TickError {
    #[error("metric provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Summary of one completed tick
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub stats: StatsRecord,
    /// Entries in the PROCS record, if one was emitted this tick
    pub processes_reported: Option<usize>,
    /// Entries in the DISK record, if one was emitted this tick
    pub disks_reported: Option<usize>,
    pub elapsed: Duration,
}

/// Single-task sampling loop feeding the anomaly detector
pub struct SamplingScheduler {
    providers: Providers,
    sink: Box<dyn RecordSink>,
    detector: AnomalyDetector,
    config: SchedulerConfig,
    tick: u64,
    last_network: Option<NetworkCounterSnapshot>,
    state: SchedulerState,
    health: Option<HealthRegistry>,
    metrics: CollectorMetrics,
    logger: StructuredLogger,
}

impl SamplingScheduler {
    pub fn new(
        providers: Providers,
        sink: Box<dyn RecordSink>,
        detector: AnomalyDetector,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            providers,
            sink,
            detector,
            config,
            tick: 0,
            last_network: None,
            state: SchedulerState::Idle,
            health: None,
            metrics: CollectorMetrics::new(),
            logger: StructuredLogger::new("localhost"),
        }
    }

    /// Next tick number to run
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Take the baseline readings the first tick computes deltas against
    ///
    /// The first CPU reading is discarded because the OS reports usage as a
    /// delta since the previous read. Failures are logged only; a missing
    /// network baseline makes the first tick report zero throughput.
    pub async fn prime(&mut self) {
        if let Err(e) = self.providers.cpu_mem.sample().await {
            warn!(error = %e, "Failed to take baseline CPU reading");
        }

        match self.providers.network.snapshot().await {
            Ok(snapshot) => self.last_network = Some(snapshot),
            Err(e) => warn!(error = %e, "Failed to take baseline network snapshot"),
        }
    }

    /// Run until a shutdown signal arrives
    ///
    /// The signal is only observed between ticks, so every record written is
    /// complete.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            process_every = self.config.process_cadence.period(),
            disk_every = self.config.disk_cadence.period(),
            "Starting sampling scheduler"
        );

        self.prime().await;
        if let Some(health) = &self.health {
            health.set_ready(true).await;
        }
        self.state = SchedulerState::Running;

        loop {
            let pause = match self.run_tick().await {
                Ok(report) => {
                    debug!(
                        tick = report.tick,
                        cpu = report.stats.cpu,
                        memory = report.stats.memory,
                        anomalies = report.stats.anomalies.len(),
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "Tick complete"
                    );
                    self.config.tick_interval
                }
                Err(e) => {
                    // The retry repeats the whole tick. If STATS was already
                    // written before a PROCS or DISK write failed, that tick
                    // number appears twice and the detector sees two samples.
                    error!(
                        tick = self.tick,
                        error = %e,
                        "Tick failed, retrying after backoff"
                    );
                    self.metrics.inc_tick_errors();
                    report_health(
                        self.health.as_ref(),
                        components::COLLECTOR,
                        Some(e.to_string()),
                    )
                    .await;
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.recv() => {
                    info!(ticks = self.tick, "Shutting down sampling scheduler");
                    break;
                }
            }
        }

        self.state = SchedulerState::Stopped;
        if let Some(health) = &self.health {
            health.set_ready(false).await;
        }
    }

    /// Sample, detect and emit for the current tick
    ///
    /// The tick counter only advances when the STATS record and any
    /// cadence records were written.
    pub async fn run_tick(&mut self) -> Result<TickReport, TickError> {
        let started = Instant::now();
        let tick = self.tick;

        let sample = self.providers.cpu_mem.sample().await?;
        let current = self.providers.network.snapshot().await?;
        let rate = self
            .last_network
            .as_ref()
            .map(|last| NetworkRate::between(last, &current))
            .unwrap_or_default();
        self.last_network = Some(current);

        let anomalies = self
            .detector
            .check(sample.cpu_percent, sample.memory_percent);
        for anomaly in &anomalies {
            self.logger.log_anomaly(tick, anomaly);
            self.metrics.inc_anomaly(anomaly);
        }

        let stats = StatsRecord {
            cpu: sample.cpu_percent,
            memory: sample.memory_percent,
            network_in: rate.received_kib_per_sec,
            network_out: rate.sent_kib_per_sec,
            anomalies,
        };
        self.sink.emit(&Record::Stats(stats.clone()))?;

        let processes_reported = if self.config.process_cadence.fires_on(tick) {
            Some(self.emit_processes(tick).await?)
        } else {
            None
        };

        let disks_reported = if self.config.disk_cadence.fires_on(tick) {
            Some(self.emit_disks(tick).await?)
        } else {
            None
        };

        self.tick += 1;
        report_health(self.health.as_ref(), components::COLLECTOR, None).await;

        let elapsed = started.elapsed();
        self.metrics.observe_tick(elapsed.as_secs_f64());

        Ok(TickReport {
            tick,
            stats,
            processes_reported,
            disks_reported,
            elapsed,
        })
    }

    async fn emit_processes(&mut self, tick: u64) -> Result<usize, EmitError> {
        let processes = match self.providers.processes.list_processes().await {
            Ok(processes) => {
                report_health(self.health.as_ref(), components::PROCESSES, None).await;
                rank_top_processes(processes, self.config.process_limit)
            }
            Err(e) => {
                self.logger.log_fetch_failure(tick, components::PROCESSES, &e);
                self.metrics.inc_fetch_errors(components::PROCESSES);
                report_health(
                    self.health.as_ref(),
                    components::PROCESSES,
                    Some(e.to_string()),
                )
                .await;
                Vec::new()
            }
        };

        let count = processes.len();
        self.sink.emit(&Record::Procs(processes))?;
        self.metrics.set_processes_reported(count);
        Ok(count)
    }

    async fn emit_disks(&mut self, tick: u64) -> Result<usize, EmitError> {
        let disks = match self.providers.disks.list_partitions().await {
            Ok(disks) => {
                report_health(self.health.as_ref(), components::DISKS, None).await;
                disks
            }
            Err(e) => {
                self.logger.log_fetch_failure(tick, components::DISKS, &e);
                self.metrics.inc_fetch_errors(components::DISKS);
                report_health(self.health.as_ref(), components::DISKS, Some(e.to_string())).await;
                Vec::new()
            }
        };

        let count = disks.len();
        self.sink.emit(&Record::Disk(disks))?;
        self.metrics.set_disks_reported(count);
        Ok(count)
    }
}

/// Borrows only the registry so the scheduler future stays `Send`
async fn report_health(
    health: Option<&HealthRegistry>,
    component: &str,
    failure: Option<String>,
) {
    if let Some(health) = health {
        health.record_outcome(component, failure).await;
    }
}

/// Builder for creating the sampling scheduler
pub struct SamplingSchedulerBuilder {
    providers: Option<Providers>,
    sink: Option<Box<dyn RecordSink>>,
    detector_config: DetectorConfig,
    config: SchedulerConfig,
    health: Option<HealthRegistry>,
    host: Option<String>,
}

impl SamplingSchedulerBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            providers: None,
            sink: None,
            detector_config: DetectorConfig::default(),
            config: SchedulerConfig::default(),
            health: None,
            host: None,
        }
    }

    /// Set the metric providers
    pub fn providers(mut self, providers: Providers) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Set where records are written
    pub fn sink(mut self, sink: impl RecordSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn detector_config(mut self, config: DetectorConfig) -> Self {
        self.detector_config = config;
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the tick period
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    /// Set the pause before retrying a failed tick
    pub fn error_backoff(mut self, backoff: Duration) -> Self {
        self.config.error_backoff = backoff;
        self
    }

    /// Report component health and readiness to this registry
    pub fn health_registry(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Host name attached to structured log events
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Build the scheduler
    pub fn build(self) -> Result<SamplingScheduler> {
        let providers = self
            .providers
            .ok_or_else(|| anyhow::anyhow!("Providers are required"))?;
        let sink = self
            .sink
            .ok_or_else(|| anyhow::anyhow!("Record sink is required"))?;
        self.detector_config.validate()?;
        if self.config.tick_interval.is_zero() {
            anyhow::bail!("Tick interval must be greater than zero");
        }

        let mut scheduler = SamplingScheduler::new(
            providers,
            sink,
            AnomalyDetector::new(self.detector_config),
            self.config,
        );
        scheduler.health = self.health;
        if let Some(host) = self.host {
            scheduler.logger = StructuredLogger::new(host);
        }
        Ok(scheduler)
    }
}

impl Default for SamplingSchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.error_backoff, Duration::from_secs(1));
        assert_eq!(config.process_cadence, Cadence::every(3));
        assert_eq!(config.disk_cadence, Cadence::every(10));
        assert_eq!(config.process_limit, 20);
    }

    #[test]
    fn test_cadence_fires_on_multiples() {
        let every_three = Cadence::every(3);
        let fired: Vec<u64> = (0..10).filter(|t| every_three.fires_on(*t)).collect();
        assert_eq!(fired, vec![0, 3, 6, 9]);

        assert!(Cadence::every(1).fires_on(7));
        assert!(!Cadence::never().fires_on(0));
        assert!(!Cadence::never().fires_on(10));
    }
}
