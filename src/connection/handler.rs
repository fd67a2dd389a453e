// src/connection/handler.rs

//! Defines the `ConnectionHandler`, which ties one session to its socket.

use super::guard::ConnectionGuard;
use super::session::{Dispatch, Session};
use super::ConnectionInfo;
use crate::core::metrics;
use crate::core::protocol::TelnetSanitizer;
use crate::core::{ConsoleError, Evaluator};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tracing::debug;

/// Owns the write side of a client socket together with the connection's
/// sanitizer and session. The read side is owned by the server loop.
#[derive(Debug)]
pub struct ConnectionHandler<E, W = OwnedWriteHalf> {
    info: ConnectionInfo,
    writer: W,
    sanitizer: TelnetSanitizer,
    session: Session<E>,
    echo_negotiation: bool,
    guard: ConnectionGuard,
}

impl<E: Evaluator, W: AsyncWrite + Unpin> ConnectionHandler<E, W> {
    /// Creates a new `ConnectionHandler`.
    pub fn new(
        info: ConnectionInfo,
        writer: W,
        session: Session<E>,
        sanitizer: TelnetSanitizer,
        echo_negotiation: bool,
    ) -> Self {
        let guard = ConnectionGuard::new(info.id, info.addr);
        Self {
            info,
            writer,
            sanitizer,
            session,
            echo_negotiation,
            guard,
        }
    }

    /// Sends the banner and the first prompt.
    pub async fn greet(&mut self, banner: Option<&str>) -> Result<(), ConsoleError> {
        self.session.start(banner);
        self.flush().await
    }

    /// Runs one raw chunk from the socket through the sanitizer and the
    /// session, then flushes whatever the session produced. Output is flushed
    /// even when the session asks to terminate or fails.
    pub async fn receive(&mut self, chunk: &[u8]) -> Result<Dispatch, ConsoleError> {
        let clean = self.sanitizer.sanitize_input(chunk);

        for seq in self.sanitizer.take_sequences() {
            let label = seq.command_label();
            metrics::CONTROL_SEQUENCES_TOTAL
                .with_label_values(&[label.as_str()])
                .inc();
            if self.echo_negotiation {
                self.session
                    .output_mut()
                    .write(&format!("TELNET: {seq}\n"));
            }
        }

        if clean.is_empty() {
            self.flush().await?;
            return Ok(Dispatch::Continue);
        }

        let fed = self.session.feed(&clean);
        let flushed = self.flush().await;
        let outcome = fed?;
        flushed?;
        Ok(outcome.dispatch)
    }

    /// Writes all pending session output to the socket.
    pub async fn flush(&mut self) -> Result<(), ConsoleError> {
        if self.session.output().is_empty() {
            return Ok(());
        }
        let bytes = self.session.output_mut().take();
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Closes the session and shuts down the write side of the socket.
    pub async fn close(&mut self) {
        self.session.close();
        if let Err(e) = self.writer.shutdown().await {
            debug!("Connection {}: shutdown failed: {}", self.info.id, e);
        }
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<E> {
        &mut self.session
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Splits the handler into the pieces that outlive the session.
    pub fn into_parts(self) -> (ConnectionInfo, W, ConnectionGuard) {
        (self.info, self.writer, self.guard)
    }
}
