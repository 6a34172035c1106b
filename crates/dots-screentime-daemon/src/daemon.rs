use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use dots_screentime_db::{Database, DatabaseConfig};
use dots_screentime_probe::{DesktopProbe, OsProbe};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::DaemonConfig;
use crate::control::ControlServer;
use crate::engine::Engine;
use crate::zone::LocalZone;

pub async fn initialize_database(config: &DaemonConfig) -> Result<Database> {
    info!("Initializing database");

    let path = config.database_path();
    let database_config = DatabaseConfig::at(&path);
    let database = Database::new(database_config).await.context("Failed to connect to database")?;

    database.run_migrations().await.context("Failed to run migrations")?;

    info!("Database initialized successfully");
    Ok(database)
}

pub async fn run(config: DaemonConfig) -> Result<()> {
    info!("Initializing daemon");

    let database = initialize_database(&config).await?;

    let probe: Arc<dyn OsProbe> =
        Arc::new(DesktopProbe::new(Duration::from_millis(config.enforcement.kill_grace_ms)));
    info!("Using {} window probe", probe.name());

    let engine =
        Engine::build(&config, database.clone(), probe, LocalZone::System, Utc::now()).await?;
    let control = ControlServer::bind(engine.service.clone(), &config.control).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sampler = tokio::spawn(engine.sampler.clone().run(shutdown_rx.clone()));
    let server = tokio::spawn(control.run(shutdown_rx));

    info!("Daemon running, waiting for shutdown signal...");
    wait_for_signal().await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sampler.await {
        error!("Sampling loop ended abnormally: {}", e);
    }
    if let Err(e) = server.await {
        error!("Control server ended abnormally: {}", e);
    }

    drop(engine);
    database.close().await;
    info!("Daemon shutdown complete");
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }
    Ok(())
}
