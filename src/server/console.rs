// src/server/console.rs

//! The public face of the server loop: binding, running, and stopping it.

use super::connection_loop;
use super::context::LoopContext;
use super::handler::{ConsoleHandler, DisconnectReason};
use super::initialization;
use crate::config::Config;
use crate::connection::{ConnectionGuard, ConnectionInfo};
use crate::core::ConsoleError;
use crate::core::metrics;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use strum::IntoEnumIterator;
use strum_macros::{Display, FromRepr};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::info;

/// Where the server loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum ServerPhase {
    Stopped = 0,
    Listening = 1,
    WaitingForReady = 2,
    Dispatching = 3,
}

/// State shared between the loop task and every `ConsoleHandle`.
#[derive(Debug)]
pub(super) struct Shared {
    stop: AtomicBool,
    phase: AtomicU8,
    connections: AtomicUsize,
    local_addr: SocketAddr,
}

impl Shared {
    fn new(local_addr: SocketAddr) -> Self {
        Self {
            stop: AtomicBool::new(false),
            phase: AtomicU8::new(ServerPhase::Stopped as u8),
            connections: AtomicUsize::new(0),
            local_addr,
        }
    }

    pub(super) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub(super) fn set_phase(&self, phase: ServerPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub(super) fn set_connections(&self, count: usize) {
        self.connections.store(count, Ordering::Release);
    }
}

/// A cloneable, thread-safe handle to a running server.
#[derive(Debug, Clone)]
pub struct ConsoleHandle {
    shared: Arc<Shared>,
}

impl ConsoleHandle {
    /// Asks the loop to exit. The loop notices within one poll interval and
    /// closes the listener. Calling it again has no further effect.
    pub fn stop(&self) {
        if !self.shared.stop.swap(true, Ordering::AcqRel) {
            info!("Stop requested for console server on {}.", self.shared.local_addr);
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.stop_requested()
    }

    pub fn phase(&self) -> ServerPhase {
        ServerPhase::from_repr(self.shared.phase.load(Ordering::Acquire))
            .unwrap_or(ServerPhase::Stopped)
    }

    /// The number of sessions the loop currently services.
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::Acquire)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }
}

/// A client connection that was still open when the loop stopped.
///
/// Stopping the server closes only the listener; these sockets stay open
/// until the caller drops them.
#[derive(Debug)]
pub struct OpenConnection {
    pub info: ConnectionInfo,
    pub stream: TcpStream,
    _guard: ConnectionGuard,
}

impl OpenConnection {
    pub(super) fn new(info: ConnectionInfo, stream: TcpStream, guard: ConnectionGuard) -> Self {
        Self {
            info,
            stream,
            _guard: guard,
        }
    }
}

/// What the loop hands back when it exits.
#[derive(Debug, Default)]
pub struct ServerExit {
    pub open_connections: Vec<OpenConnection>,
}

/// A bound, not yet running console server.
pub struct ConsoleServer<H: ConsoleHandler> {
    config: Config,
    handler: H,
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl<H: ConsoleHandler> ConsoleServer<H> {
    /// Validates `config` and binds the listening socket.
    pub async fn bind(config: Config, handler: H) -> Result<Self, ConsoleError> {
        config
            .validate()
            .map_err(|e| ConsoleError::InvalidConfig(e.to_string()))?;
        let listener = initialization::bind_listener(&config).await?;
        let local_addr = listener.local_addr()?;

        // Expose every close reason at zero from the start.
        for reason in DisconnectReason::iter() {
            let label: &'static str = reason.into();
            metrics::SESSIONS_CLOSED_TOTAL.with_label_values(&[label]);
        }
        Ok(Self {
            config,
            handler,
            listener,
            shared: Arc::new(Shared::new(local_addr)),
        })
    }

    /// Binds the server and runs its loop on a new task.
    pub async fn start(
        config: Config,
        handler: H,
    ) -> Result<(ConsoleHandle, JoinHandle<Result<ServerExit, ConsoleError>>), ConsoleError> {
        let server = Self::bind(config, handler).await?;
        let handle = server.handle();
        let task = tokio::spawn(server.run());
        Ok((handle, task))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn handle(&self) -> ConsoleHandle {
        ConsoleHandle {
            shared: self.shared.clone(),
        }
    }

    /// Runs the loop until `ConsoleHandle::stop` is called.
    pub async fn run(self) -> Result<ServerExit, ConsoleError> {
        let ctx = LoopContext::new(self.config, self.handler, self.listener, self.shared);
        connection_loop::run(ctx).await
    }
}
