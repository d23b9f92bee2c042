//! Stats collector - host telemetry over a tagged JSON line protocol
//!
//! The binary samples the local host and writes `STATS:`, `PROCS:` and
//! `DISK:` records to stdout. This library target exposes its configuration
//! and HTTP endpoint so they can be exercised from integration tests.

pub mod api;
pub mod config;
