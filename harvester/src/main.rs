use std::sync::Arc;

use common::logger::init_logger;
use harvester::{
    backend::BackendClient,
    config::AppConfig,
    driver::{DriverConfig, run_harvest_loop},
    metrics::HarvestCounters,
    scheduler::{Collaborators, HarvestScheduler},
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("harvester", is_production);

    tracing::info!("Starting harvester...");

    let cfg = AppConfig::from_env();
    tracing::info!(backends = ?cfg.backends, "backend peers configured");

    let client = Arc::new(BackendClient::new(cfg.backends.clone(), cfg.http_timeout)?);
    let counters = HarvestCounters::default();

    let scheduler = Arc::new(HarvestScheduler::new(
        cfg.harvest.clone(),
        Collaborators::from_client(client),
        cfg.backends.clone(),
        counters.clone(),
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = DriverConfig {
        pause: cfg.loop_pause,
        stats_every: cfg.stats_every,
    };

    let harvest_loop = tokio::spawn(run_harvest_loop(
        scheduler.clone(),
        driver,
        counters.clone(),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    // The current cycle finishes; no new one starts.
    let _ = shutdown_tx.send(true);
    let cycles = harvest_loop.await?;

    scheduler.shutdown().await;

    tracing::info!(cycles, totals = ?counters.snapshot(), "harvester stopped");
    Ok(())
}
