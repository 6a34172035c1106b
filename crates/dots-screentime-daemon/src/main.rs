use anyhow::Result;
use dots_screentime_daemon::config::DaemonConfig;
use dots_screentime_daemon::daemon;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = DaemonConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting DOTS Screen Time Daemon");

    if let Err(e) = daemon::run(config).await {
        error!("Daemon error: {:#}", e);
        return Err(e);
    }

    info!("DOTS Screen Time Daemon stopped");
    Ok(())
}
