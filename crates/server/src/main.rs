mod assistant;
mod bootstrap;
mod health;
#[cfg(test)]
mod test_support;
pub mod web;

use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use taskpilot_core::config::{AppConfig, LoadOptions};
use tokio::sync::oneshot;

fn init_logging(config: &AppConfig) -> Result<()> {
    use taskpilot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt().with_target(false).with_max_level(log_level);

    let Some(path) = &config.logging.file else {
        match config.logging.format {
            Compact => builder.compact().init(),
            Pretty => builder.pretty().init(),
            Json => builder.json().init(),
        }
        return Ok(());
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory `{}`", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file `{}`", path.display()))?;
    let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config)?;

    let app = bootstrap::bootstrap_with_config(config).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding web front end to {address}"))?;
    let routes = web::router(web::WebState::new(app.runtime.clone()))
        .merge(health::router(app.runtime.clone()));

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, routes)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "taskpilot web front end listening"
    );

    let telegram = app.telegram_runner.map(|runner| {
        tokio::spawn(async move {
            let offset = runner.start().await;
            tracing::info!(event_name = "system.telegram.stopped", offset, "telegram polling stopped");
        })
    });

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "taskpilot-server stopping"
    );

    if let Some(telegram) = telegram {
        telegram.abort();
    }
    let _ = shutdown_tx.send(());
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(error))) => tracing::error!(event_name = "system.server.error", error = %error, "web server failed"),
        Ok(Err(join_error)) => {
            tracing::error!(event_name = "system.server.error", error = %join_error, "web server task aborted")
        }
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            grace_secs = app.config.server.graceful_shutdown_secs,
            "in-flight requests did not drain before the grace period"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
