//! Providers backed by the `sysinfo` crate
//!
//! Each provider owns only the `sysinfo` state it needs so the scheduler can
//! hold them independently.

use super::{async_trait, CpuMemProvider, DiskProvider, NetworkProvider, ProcessProvider, ProviderError};
use crate::models::{round1, CpuMemSample, DiskInfo, NetworkCounterSnapshot, ProcessInfo};
use chrono::Utc;
use sysinfo::{
    CpuRefreshKind, Disks, MemoryRefreshKind, Networks, Process, ProcessRefreshKind,
    ProcessStatus, ProcessesToUpdate, RefreshKind, System, UpdateKind, Users,
};
use tracing::debug;

/// User name reported when a process owner cannot be resolved
pub const HIDDEN_USER: &str = "System/Hidden";

/// File systems that are virtual, in-memory or network mounted
const VIRTUAL_FS_TYPES: &[&str] = &[
    "autofs", "binfmt_misc", "bpf", "cgroup", "cgroup2", "configfs", "debugfs", "devfs",
    "devpts", "devtmpfs", "efivarfs", "fusectl", "hugetlbfs", "mqueue", "nsfs", "overlay",
    "proc", "pstore", "ramfs", "rpc_pipefs", "securityfs", "squashfs", "sysfs", "tmpfs",
    "tracefs", "cifs", "smbfs", "smb3", "ncpfs", "afs", "9p", "sshfs",
];

/// Whether a partition with this file system type should be left out of
/// disk reports
pub fn is_virtual_fs(fstype: &str) -> bool {
    let fstype = fstype.to_ascii_lowercase();
    VIRTUAL_FS_TYPES.contains(&fstype.as_str())
        || fstype.starts_with("nfs")
        || fstype.starts_with("fuse.")
}

fn total_memory(system: &mut System) -> Result<u64, ProviderError> {
    system.refresh_memory();
    match system.total_memory() {
        0 => Err(ProviderError::Unavailable(
            "total memory reported as zero".to_string(),
        )),
        total => Ok(total),
    }
}

/// Global CPU and memory utilisation
pub struct SysinfoCpuMem {
    system: System,
}

impl SysinfoCpuMem {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        Self { system }
    }
}

impl Default for SysinfoCpuMem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CpuMemProvider for SysinfoCpuMem {
    async fn sample(&mut self) -> Result<CpuMemSample, ProviderError> {
        // Usage is the delta since the previous refresh; the first call after
        // construction has no baseline and reads as zero
        self.system.refresh_cpu_usage();
        let total = total_memory(&mut self.system)?;
        let available = self.system.available_memory().min(total);

        Ok(CpuMemSample {
            cpu_percent: round1(self.system.global_cpu_usage() as f64),
            memory_percent: round1((total - available) as f64 / total as f64 * 100.0),
        })
    }
}

/// Cumulative byte counters summed over all interfaces
pub struct SysinfoNetwork;

impl SysinfoNetwork {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SysinfoNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkProvider for SysinfoNetwork {
    async fn snapshot(&mut self) -> Result<NetworkCounterSnapshot, ProviderError> {
        // Totals come straight from the kernel counters, so a fresh listing
        // also picks up interfaces that appeared since the last tick
        let networks = Networks::new_with_refreshed_list();
        let (bytes_sent, bytes_received) = networks
            .list()
            .values()
            .fold((0u64, 0u64), |(sent, received), data| {
                (
                    sent.saturating_add(data.total_transmitted()),
                    received.saturating_add(data.total_received()),
                )
            });

        Ok(NetworkCounterSnapshot {
            bytes_sent,
            bytes_received,
            timestamp: Utc::now(),
        })
    }
}

/// Per-process CPU and memory usage with owner names
pub struct SysinfoProcesses {
    system: System,
    users: Users,
}

impl SysinfoProcesses {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            users: Users::new_with_refreshed_list(),
        }
    }

    fn username(&self, process: &Process) -> String {
        process
            .user_id()
            .and_then(|uid| self.users.get_user_by_id(uid))
            .map(|user| user.name().to_string())
            .unwrap_or_else(|| HIDDEN_USER.to_string())
    }

    fn describe(&self, process: &Process, total_memory: u64) -> Option<ProcessInfo> {
        // Zombies have no usage to report and threads are folded into their
        // parent process
        if process.status() == ProcessStatus::Zombie || process.thread_kind().is_some() {
            return None;
        }

        Some(ProcessInfo {
            pid: process.pid().as_u32(),
            name: process.name().to_string_lossy().into_owned(),
            cpu_percent: process.cpu_usage() as f64,
            memory_percent: process.memory() as f64 / total_memory as f64 * 100.0,
            username: self.username(process),
        })
    }
}

impl Default for SysinfoProcesses {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessProvider for SysinfoProcesses {
    async fn list_processes(&mut self) -> Result<Vec<ProcessInfo>, ProviderError> {
        let total = total_memory(&mut self.system)?;
        // The plain refresh leaves owners unset, so ask for them explicitly
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_memory()
                .with_user(UpdateKind::OnlyIfNotSet),
        );

        if self.system.processes().is_empty() {
            return Err(ProviderError::Unavailable(
                "process table is empty".to_string(),
            ));
        }

        let unknown_owner = self.system.processes().values().any(|p| {
            p.user_id()
                .is_some_and(|uid| self.users.get_user_by_id(uid).is_none())
        });
        if unknown_owner {
            self.users.refresh();
        }

        let processes: Vec<ProcessInfo> = self
            .system
            .processes()
            .values()
            .filter_map(|process| self.describe(process, total))
            .collect();

        debug!(
            listed = processes.len(),
            total = self.system.processes().len(),
            "Enumerated processes"
        );

        Ok(processes)
    }
}

/// Usage of mounted physical partitions
pub struct SysinfoDisks;

impl SysinfoDisks {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SysinfoDisks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiskProvider for SysinfoDisks {
    async fn list_partitions(&mut self) -> Result<Vec<DiskInfo>, ProviderError> {
        let disks = Disks::new_with_refreshed_list();

        let partitions = disks
            .list()
            .iter()
            .filter_map(|disk| {
                let fstype = disk.file_system().to_string_lossy().into_owned();
                if is_virtual_fs(&fstype) {
                    return None;
                }

                let total = disk.total_space();
                if total == 0 {
                    debug!(mountpoint = %disk.mount_point().display(), "Skipping unreadable partition");
                    return None;
                }
                let free = disk.available_space().min(total);
                let used = total - free;

                Some(DiskInfo {
                    device: disk.name().to_string_lossy().into_owned(),
                    mountpoint: disk.mount_point().to_string_lossy().into_owned(),
                    fstype,
                    total,
                    used,
                    free,
                    percent: round1(used as f64 / total as f64 * 100.0),
                })
            })
            .collect();

        Ok(partitions)
    }
}
