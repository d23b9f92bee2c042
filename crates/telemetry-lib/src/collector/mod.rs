//! Host metrics collection
//!
//! This module defines the provider traits the sampling scheduler reads
//! from, a `sysinfo`-backed implementation of each, and the scheduler
//! itself.

mod scheduler;
mod sysinfo_provider;


pub use scheduler::{
    Cadence, SamplingScheduler, SamplingSchedulerBuilder, SchedulerConfig, SchedulerState,
    TickError, TickReport,
};
pub use sysinfo_provider::{
    is_virtual_fs, SysinfoCpuMem, SysinfoDisks, SysinfoNetwork, SysinfoProcesses, HIDDEN_USER,
};

use crate::models::{
    round1, CpuMemSample, DiskInfo, NetworkCounterSnapshot, ProcessInfo,
};
use thiserror::Error;

pub use async_trait::async_trait;

/// Failure of a provider to produce a reading
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("metric source unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of global CPU and memory utilisation
#[async_trait]
pub trait CpuMemProvider: Send {
    /// Current CPU and memory percentages; the last known value if no new
    /// OS sample is ready yet
    async fn sample(&mut self) -> Result<CpuMemSample, ProviderError>;
}

/// Source of cumulative network byte counters
#[async_trait]
pub trait NetworkProvider: Send {
    async fn snapshot(&mut self) -> Result<NetworkCounterSnapshot, ProviderError>;
}

/// Source of per-process usage
#[async_trait]
pub trait ProcessProvider: Send {
    /// All readable processes; entries that cannot be read are skipped
    async fn list_processes(&mut self) -> Result<Vec<ProcessInfo>, ProviderError>;
}

/// Source of per-partition disk usage
#[async_trait]
pub trait DiskProvider: Send {
    /// Physical partitions with their usage; unreadable ones are skipped
    async fn list_partitions(&mut self) -> Result<Vec<DiskInfo>, ProviderError>;
}

/// The four metric sources the scheduler samples from
pub struct Providers {
    pub cpu_mem: Box<dyn CpuMemProvider>,
    pub network: Box<dyn NetworkProvider>,
    pub processes: Box<dyn ProcessProvider>,
    pub disks: Box<dyn DiskProvider>,
}

impl Providers {
    /// Providers reading the local host through `sysinfo`
    pub fn system() -> Self {
        Self {
            cpu_mem: Box::new(SysinfoCpuMem::new()),
            network: Box::new(SysinfoNetwork::new()),
            processes: Box::new(SysinfoProcesses::new()),
            disks: Box::new(SysinfoDisks::new()),
        }
    }
}

/// Network throughput between two snapshots, in KiB/s
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NetworkRate {
    pub received_kib_per_sec: f64,
    pub sent_kib_per_sec: f64,
}

impl NetworkRate {
    /// Rate between `last` and `current`, rounded to one decimal
    ///
    /// A non-positive elapsed time counts as one second. Counters that went
    /// backwards (interface reset) yield zero rather than a negative rate.
    pub fn between(last: &NetworkCounterSnapshot, current: &NetworkCounterSnapshot) -> Self {
        let elapsed_ms = (current.timestamp - last.timestamp).num_milliseconds();
        let elapsed_secs = if elapsed_ms <= 0 {
            1.0
        } else {
            elapsed_ms as f64 / 1000.0
        };

        let per_sec = |now: u64, before: u64| {
            round1(now.saturating_sub(before) as f64 / elapsed_secs / 1024.0)
        };

        Self {
            received_kib_per_sec: per_sec(current.bytes_received, last.bytes_received),
            sent_kib_per_sec: per_sec(current.bytes_sent, last.bytes_sent),
        }
    }
}

/// Highest-CPU processes first, at most `limit` of them
///
/// The sort is stable, so processes with equal usage keep the order the
/// provider returned them in. A NaN reading sorts ahead of every number
/// rather than breaking the ordering.
pub fn rank_top_processes(mut processes: Vec<ProcessInfo>, limit: usize) -> Vec<ProcessInfo> {
    processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
    processes.truncate(limit);
    processes
}
