// src/connection/mod.rs

//! Everything scoped to a single client connection: its line-buffering session,
//! its output buffer, its bounded socket reader, and the handler that ties
//! them to the socket.

mod guard;
mod handler;
mod output;
mod reader;
mod session;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
pub use output::SessionOutput;
pub use reader::{ChunkReader, ReadEvent};
pub use session::{Dispatch, FeedOutcome, Prompts, Session};

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

/// Identifies one accepted connection for as long as the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the embedding application is told about a connection in its hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
}
