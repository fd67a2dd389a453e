// src/server/mod.rs

use crate::config::Config;
use crate::core::evaluator::CalculatorHandler;
use anyhow::{Result, anyhow};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

mod connection_loop;
mod console;
mod context;
mod handler;
mod initialization;
mod metrics_server;

pub use console::{ConsoleHandle, ConsoleServer, OpenConnection, ServerExit, ServerPhase};
pub use handler::{ConsoleHandler, DisconnectReason};

/// Runs the standalone server: the bundled calculator evaluator on the
/// configured port, until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut background_tasks: JoinSet<()> = JoinSet::new();

    if config.metrics.enabled {
        let port = config.metrics.port;
        let shutdown_rx = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            metrics_server::run_metrics_server(port, shutdown_rx).await;
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    let server = ConsoleServer::bind(config, CalculatorHandler::default()).await?;
    let handle = server.handle();

    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;
    let signal_task = tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        }
        handle.stop();
    });

    let exit = server.run().await;
    signal_task.abort();
    let exit = exit?;
    if !exit.open_connections.is_empty() {
        info!(
            "Closing {} client connection(s) left open at shutdown.",
            exit.open_connections.len()
        );
    }
    drop(exit);

    if shutdown_tx.send(()).is_err() {
        info!("No background task was listening for the shutdown signal.");
    }
    if tokio::time::timeout(Duration::from_secs(5), async {
        while background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    }
    info!("Server shutdown complete.");
    Ok(())
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Poll timeout {:?}, read chunk size {} bytes, backlog {}.",
        config.poll_timeout, config.read_chunk_size, config.backlog
    );
    if config.telnet.echo_negotiation {
        warn!("Telnet negotiation echo is enabled; clients will see TELNET diagnostic lines.");
    }
}
