//! Stats collector binary
//!
//! Samples CPU, memory and network every tick, processes and disks on slower
//! cadences, and writes one tagged JSON line per record to stdout. Logs go
//! to stderr.

use anyhow::Result;
use stats_collector::{api, config::CollectorConfig};
use std::sync::Arc;
use telemetry_lib::{
    collector::{Providers, SamplingSchedulerBuilder},
    health::HealthRegistry,
    observability::{CollectorMetrics, StructuredLogger},
    output::LineSink,
};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const COLLECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the record protocol, so logs must go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let config = CollectorConfig::load()?;
    info!(host = %config.host_name, "Collector configured");

    let health_registry = HealthRegistry::with_collector_components().await;
    let metrics = CollectorMetrics::new();

    let logger = StructuredLogger::new(&config.host_name);
    logger.log_startup(
        COLLECTOR_VERSION,
        config.window_size,
        config.policy.as_str(),
    );

    if config.api_port != 0 {
        let state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
        let port = config.api_port;
        tokio::spawn(async move {
            if let Err(e) = api::serve(port, state).await {
                error!(error = %e, "Health/metrics server stopped");
            }
        });
    }

    let mut scheduler = SamplingSchedulerBuilder::new()
        .providers(Providers::system())
        .sink(LineSink::stdout())
        .detector_config(config.detector_config())
        .config(config.scheduler_config())
        .health_registry(health_registry)
        .host(config.host_name.clone())
        .build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = signal_tx.send(());
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    scheduler.run(shutdown_rx).await;
    logger.log_shutdown("SIGINT received", scheduler.tick());
    drop(shutdown_tx);

    Ok(())
}
