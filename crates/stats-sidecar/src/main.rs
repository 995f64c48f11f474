//! Stats sidecar binary

use stats_sidecar::shutdown;
use stats_sidecar::{Config, Identity, Scheduler, TelemetryPublisher};
use status_probe::TcpStatusProbe;
use std::sync::Arc;

#[tokio::main]
async fn main() -> common::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Load settings first (needed for logging setup)
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            // Can't use tracing yet - not initialized
            eprintln!("Configuration error: {}", e);
            eprintln!("Using default configuration");
            Config::default()
        }
    };

    let _log_guard = common::logging::init(&config.to_log_settings())?;

    tracing::info!("Stats sidecar starting");
    match &config.source {
        Some(path) => tracing::info!("Settings loaded from {}", path.display()),
        None => tracing::info!("No settings file found, using defaults"),
    }

    let identity = Identity::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid environment configuration");
        e
    })?;
    tracing::info!("Config {:?}", identity);

    let publisher = TelemetryPublisher::new(config.ingestion.clone())?;

    let (trigger, shutdown_rx) = shutdown::channel();
    shutdown::spawn_signal_listener(trigger);

    let scheduler = Scheduler::new(
        identity,
        config.schedule.clone(),
        Arc::new(TcpStatusProbe::new()),
        Arc::new(publisher),
        shutdown_rx,
    );

    let stats = scheduler.run().await;

    tracing::info!(
        cycles = stats.total_cycles,
        published = stats.published,
        "Stats sidecar stopped"
    );

    Ok(())
}
