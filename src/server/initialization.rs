// src/server/initialization.rs

//! Handles listener setup: address resolution, socket options and backlog.

use crate::config::Config;
use crate::core::ConsoleError;
use tokio::net::{TcpListener, TcpSocket, lookup_host};
use tracing::{debug, info};

/// Resolves the configured host, then binds and listens with `SO_REUSEADDR`
/// and the configured backlog.
pub(super) async fn bind_listener(config: &Config) -> Result<TcpListener, ConsoleError> {
    let target = format!("{}:{}", config.host, config.port);
    let addr = lookup_host((config.host.as_str(), config.port))
        .await?
        .next()
        .ok_or_else(|| ConsoleError::AddressResolution(target.clone()))?;
    debug!("Resolved listen address '{}' to {}", target, addr);

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(config.backlog)?;

    info!(
        "Console server listening on {} (backlog {})",
        listener.local_addr()?,
        config.backlog
    );
    Ok(listener)
}
