// src/server/context.rs

use super::console::Shared;
use super::handler::ConsoleHandler;
use crate::config::Config;
use crate::connection::{ChunkReader, ConnectionHandler, ConnectionId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::StreamMap;

/// Holds everything the server loop owns. Only the loop task touches it, so
/// none of it is locked.
pub(super) struct LoopContext<H: ConsoleHandler> {
    pub config: Config,
    pub handler: H,
    pub listener: TcpListener,
    pub local_addr: SocketAddr,
    pub shared: Arc<Shared>,
    /// Read sides of every live client, polled together for readiness.
    pub readers: StreamMap<ConnectionId, ChunkReader>,
    /// Write sides and sessions, keyed like `readers`.
    pub connections: HashMap<ConnectionId, ConnectionHandler<H::Evaluator>>,
    pub next_id: u64,
}

impl<H: ConsoleHandler> LoopContext<H> {
    pub fn new(config: Config, handler: H, listener: TcpListener, shared: Arc<Shared>) -> Self {
        let local_addr = listener
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], config.port)));
        Self {
            config,
            handler,
            listener,
            local_addr,
            shared,
            readers: StreamMap::new(),
            connections: HashMap::new(),
            next_id: 0,
        }
    }
}
