// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection accounting.

use super::ConnectionId;
use crate::core::metrics;
use std::net::SocketAddr;
use tracing::debug;

/// Keeps the connected-clients gauge in step with the connections the loop
/// actually holds. Created on accept, dropped with the connection.
#[derive(Debug)]
pub struct ConnectionGuard {
    pub(crate) id: ConnectionId,
    pub(crate) addr: SocketAddr,
}

impl ConnectionGuard {
    pub(crate) fn new(id: ConnectionId, addr: SocketAddr) -> Self {
        metrics::CONNECTIONS_RECEIVED_TOTAL.inc();
        metrics::CONNECTED_CLIENTS.inc();
        Self { id, addr }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::CONNECTED_CLIENTS.dec();
        debug!(
            "ConnectionGuard dropping for connection {} ({})",
            self.id, self.addr
        );
    }
}
