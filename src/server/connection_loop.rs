// src/server/connection_loop.rs

//! Contains the single-task readiness loop that multiplexes every client session.
//!
//! Each iteration waits, for at most `poll_timeout`, until the listener or any
//! client is readable, then services the event and every other client that is
//! already readable. Writes are awaited inline: a client that stops reading
//! its output can stall the loop, and there is no fairness beyond the order in
//! which readiness is reported.

use super::console::{OpenConnection, ServerExit, ServerPhase};
use super::context::LoopContext;
use super::handler::{ConsoleHandler, DisconnectReason};
use crate::connection::{
    ChunkReader, ConnectionHandler, ConnectionId, ConnectionInfo, Dispatch, Prompts, ReadEvent,
    Session,
};
use crate::core::metrics;
use crate::core::protocol::TelnetSanitizer;
use crate::core::ConsoleError;
use futures::FutureExt;
use std::io;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, trace, warn};

/// The outcome of one wait for readiness.
enum LoopEvent {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Read(ConnectionId, ReadEvent),
    Idle,
}

/// Runs the loop until a stop is requested, then closes the listener and
/// returns the client connections that are still open.
pub(super) async fn run<H: ConsoleHandler>(
    mut ctx: LoopContext<H>,
) -> Result<ServerExit, ConsoleError> {
    info!("Console server accepting connections on {}", ctx.local_addr);
    ctx.shared.set_phase(ServerPhase::Listening);

    while !ctx.shared.stop_requested() {
        ctx.shared.set_phase(ServerPhase::WaitingForReady);

        let event = tokio::select! {
            biased;

            res = ctx.listener.accept() => LoopEvent::Accepted(res),

            Some((id, read)) = ctx.readers.next(), if !ctx.readers.is_empty() => {
                LoopEvent::Read(id, read)
            }

            _ = tokio::time::sleep(ctx.config.poll_timeout) => LoopEvent::Idle,
        };

        ctx.shared.set_phase(ServerPhase::Dispatching);
        match event {
            LoopEvent::Accepted(Ok((socket, addr))) => ctx.accept(socket, addr).await,
            LoopEvent::Accepted(Err(e)) => {
                metrics::ACCEPT_ERRORS_TOTAL.inc();
                error!("Failed to accept connection: {}", e);
            }
            LoopEvent::Read(id, read) => ctx.handle_read(id, read).await,
            LoopEvent::Idle => {
                trace!("Poll interval elapsed with nothing ready.");
                continue;
            }
        }

        // Drain clients that are already readable. Bounded by the reader count, not
        // per client: a busy reader may be serviced more than once in this pass.
        for _ in 0..ctx.readers.len() {
            match ctx.readers.next().now_or_never() {
                Some(Some((id, read))) => ctx.handle_read(id, read).await,
                _ => break,
            }
        }
    }

    let exit = ctx.shutdown();
    info!(
        "Console server stopped. Listener closed; {} client connection(s) left open.",
        exit.open_connections.len()
    );
    Ok(exit)
}

impl<H: ConsoleHandler> LoopContext<H> {
    /// Builds, greets and registers the session for a new connection.
    async fn accept(&mut self, socket: TcpStream, addr: SocketAddr) {
        self.next_id = self.next_id.wrapping_add(1);
        let id = ConnectionId(self.next_id);
        info!("Accepted new connection {} from: {}", id, addr);

        if let Err(e) = socket.set_nodelay(true) {
            debug!("Connection {}: could not set TCP_NODELAY: {}", id, e);
        }

        let info = ConnectionInfo {
            id,
            addr,
            connected_at: Instant::now(),
        };
        let console = &self.config.console;
        let session = Session::new(
            id,
            self.handler.evaluator(&info),
            Prompts::from(console),
            console.decode_policy,
        );
        let sanitizer = TelnetSanitizer::new(self.config.telnet.log_negotiation);
        let (read_half, write_half) = socket.into_split();
        let mut conn = ConnectionHandler::new(
            info.clone(),
            write_half,
            session,
            sanitizer,
            self.config.telnet.echo_negotiation,
        );

        if let Err(e) = conn.greet(self.config.console.banner.as_deref()).await {
            warn!("Connection {} from {} failed during start-up: {}", id, addr, e);
            conn.close().await;
            let reason: &'static str = DisconnectReason::TransportError.into();
            metrics::SESSIONS_CLOSED_TOTAL
                .with_label_values(&[reason])
                .inc();
            return;
        }

        self.readers
            .insert(id, ChunkReader::new(read_half, self.config.read_chunk_size));
        self.connections.insert(id, conn);
        self.shared.set_connections(self.connections.len());
        self.handler.on_connect(&info);
    }

    /// Routes one read observation to its connection.
    async fn handle_read(&mut self, id: ConnectionId, read: ReadEvent) {
        match read {
            ReadEvent::Closed => {
                debug!("Connection {} closed by peer.", id);
                self.teardown(id, DisconnectReason::PeerClosed).await;
            }
            ReadEvent::Failed(e) => {
                let e = ConsoleError::from(e);
                if e.is_normal_disconnect() {
                    debug!("Connection {} dropped by peer: {}", id, e);
                } else {
                    warn!("Read error on connection {}: {}", id, e);
                }
                self.teardown(id, DisconnectReason::TransportError).await;
            }
            ReadEvent::Data(chunk) => {
                let Some(conn) = self.connections.get_mut(&id) else {
                    warn!("Data for unknown connection {}; deregistering it.", id);
                    self.readers.remove(&id);
                    return;
                };
                trace!("Connection {}: read {} bytes.", id, chunk.len());

                let result = conn.receive(&chunk).await;
                match result {
                    Ok(Dispatch::Continue) => {}
                    Ok(Dispatch::Terminate) => {
                        self.teardown(id, DisconnectReason::EndOfTransmission).await;
                    }
                    Err(e) if e.is_normal_disconnect() => {
                        debug!("Connection {} went away while writing: {}", id, e);
                        self.teardown(id, DisconnectReason::TransportError).await;
                    }
                    Err(e @ ConsoleError::Io(_)) => {
                        warn!("Write error on connection {}: {}", id, e);
                        self.teardown(id, DisconnectReason::TransportError).await;
                    }
                    Err(e) => {
                        warn!("Session {} failed: {}", id, e);
                        self.teardown(id, DisconnectReason::SessionError).await;
                    }
                }
            }
        }
    }

    /// Deregisters a connection, closes its session and socket, and notifies the handler.
    async fn teardown(&mut self, id: ConnectionId, reason: DisconnectReason) {
        self.readers.remove(&id);
        let Some(mut conn) = self.connections.remove(&id) else {
            return;
        };
        conn.close().await;
        self.shared.set_connections(self.connections.len());

        let label: &'static str = reason.into();
        metrics::SESSIONS_CLOSED_TOTAL.with_label_values(&[label]).inc();
        info!(
            "Connection {} from {} closed ({}).",
            id,
            conn.info().addr,
            reason
        );
        self.handler.on_disconnect(conn.info(), reason);
    }

    /// Closes the listener and hands back the sockets of every live client.
    fn shutdown(self) -> ServerExit {
        let LoopContext {
            listener,
            mut readers,
            connections,
            shared,
            ..
        } = self;
        drop(listener);
        shared.set_phase(ServerPhase::Stopped);

        let mut open_connections = Vec::with_capacity(connections.len());
        for (id, conn) in connections {
            let Some(reader) = readers.remove(&id) else {
                continue;
            };
            let (info, writer, guard) = conn.into_parts();
            match reader.into_inner().reunite(writer) {
                Ok(stream) => open_connections.push(OpenConnection::new(info, stream, guard)),
                Err(e) => warn!("Connection {}: could not reassemble socket: {}", id, e),
            }
        }
        shared.set_connections(0);
        open_connections.sort_by_key(|c| c.info.id);
        ServerExit { open_connections }
    }
}
