//! Tagged line protocol for emitted records
//!
//! Every record is one line: a tag, a colon, and a compact JSON document.
//! Lines are flushed as soon as they are written so a consumer reading the
//! pipe sees each record immediately.

use crate::models::{DiskInfo, ProcessInfo, StatsRecord};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Failure to deliver a record to its sink
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to write record: {0}")]
    Output(#[from] io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A single output record
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Stats(StatsRecord),
    Procs(Vec<ProcessInfo>),
    Disk(Vec<DiskInfo>),
}

impl Record {
    pub fn tag(&self) -> &'static str {
        match self {
            Record::Stats(_) => "STATS",
            Record::Procs(_) => "PROCS",
            Record::Disk(_) => "DISK",
        }
    }

    /// Encode as a complete protocol line, including the trailing newline
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let body = match self {
            Record::Stats(stats) => serde_json::to_string(stats)?,
            Record::Procs(procs) => serde_json::to_string(procs)?,
            Record::Disk(disks) => serde_json::to_string(disks)?,
        };
        Ok(format!("{}:{}\n", self.tag(), body))
    }
}

/// Destination for emitted records
pub trait RecordSink: Send {
    fn emit(&mut self, record: &Record) -> Result<(), EmitError>;
}

/// Writes records as tagged lines to any byte stream
pub struct LineSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl LineSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> RecordSink for LineSink<W> {
    fn emit(&mut self, record: &Record) -> Result<(), EmitError> {
        let line = record.to_line()?;
        // One write per record keeps lines whole even if the reader is slow
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// In-memory sink that keeps every record, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl RecordSink for MemorySink {
    fn emit(&mut self, record: &Record) -> Result<(), EmitError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory sink poisoned"))?;
        records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Anomaly, MetricKind, Severity};

    fn sample_stats() -> StatsRecord {
        StatsRecord {
            cpu: 12.5,
            memory: 48.0,
            network_in: 3.2,
            network_out: 1.0,
            anomalies: vec![Anomaly {
                metric: MetricKind::Cpu,
                severity: Severity::Critical,
                z_score: 4.0,
                message: "CPU Spike! (Z: 4.0)".to_string(),
            }],
        }
    }

    #[test]
    fn test_stats_line_format() {
        let line = Record::Stats(sample_stats()).to_line().unwrap();

        assert!(line.starts_with("STATS:{"));
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let json: serde_json::Value = serde_json::from_str(&line["STATS:".len()..]).unwrap();
        assert_eq!(json["cpu"], 12.5);
        assert_eq!(json["memory"], 48.0);
        assert_eq!(json["network_in"], 3.2);
        assert_eq!(json["network_out"], 1.0);
        assert_eq!(json["anomalies"][0]["type"], "CPU");
        assert_eq!(json["anomalies"][0]["severity"], "CRITICAL");
        assert_eq!(json["anomalies"][0]["message"], "CPU Spike! (Z: 4.0)");
    }

    #[test]
    fn test_empty_lists_encode_as_arrays() {
        assert_eq!(Record::Procs(vec![]).to_line().unwrap(), "PROCS:[]\n");
        assert_eq!(Record::Disk(vec![]).to_line().unwrap(), "DISK:[]\n");
    }

    #[test]
    fn test_procs_and_disk_fields() {
        let procs = Record::Procs(vec![ProcessInfo {
            pid: 42,
            name: "nginx".to_string(),
            cpu_percent: 3.5,
            memory_percent: 0.8,
            username: "www-data".to_string(),
        }]);
        let line = procs.to_line().unwrap();
        let json: serde_json::Value = serde_json::from_str(&line["PROCS:".len()..]).unwrap();
        assert_eq!(json[0]["pid"], 42);
        assert_eq!(json[0]["name"], "nginx");
        assert_eq!(json[0]["username"], "www-data");

        let disk = Record::Disk(vec![DiskInfo {
            device: "/dev/sda1".to_string(),
            mountpoint: "/".to_string(),
            fstype: "ext4".to_string(),
            total: 1000,
            used: 250,
            free: 750,
            percent: 25.0,
        }]);
        let line = disk.to_line().unwrap();
        let json: serde_json::Value = serde_json::from_str(&line["DISK:".len()..]).unwrap();
        assert_eq!(json[0]["device"], "/dev/sda1");
        assert_eq!(json[0]["total"], 1000);
        assert_eq!(json[0]["percent"], 25.0);
    }

    #[test]
    fn test_line_sink_writes_each_record() {
        let mut sink = LineSink::new(Vec::new());
        sink.emit(&Record::Stats(sample_stats())).unwrap();
        sink.emit(&Record::Procs(vec![])).unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("STATS:"));
        assert_eq!(lines[1], "PROCS:[]");
    }

    #[test]
    fn test_memory_sink_shares_records() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.emit(&Record::Disk(vec![])).unwrap();

        assert_eq!(sink.records(), vec![Record::Disk(vec![])]);
        sink.clear();
        assert!(sink.records().is_empty());
    }
}
