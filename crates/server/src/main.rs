mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use pedibot_core::config::{AppConfig, LoadOptions};
use pedibot_pipeline::{spawn_reaper, spawn_workers};

fn init_logging(config: &AppConfig) {
    use pedibot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let workers = spawn_workers(
        app.config.worker.count,
        app.queue.clone(),
        app.pipeline.clone(),
        Duration::from_millis(app.config.worker.poll_interval_ms),
    );

    let lease = Duration::from_secs(app.config.worker.job_lease_secs);
    let _reaper = spawn_reaper(app.queue.clone(), lease, lease / 2, workers.shutdown_signal());

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        worker_count = app.config.worker.count,
        "pedibot-server started"
    );

    wait_for_shutdown().await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "pedibot-server stopping"
    );

    let graceful = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(graceful, workers.shutdown()).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "workers did not drain within the graceful window"
        );
    }
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
