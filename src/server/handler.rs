// src/server/handler.rs

//! The hooks an embedding application implements to plug into the server loop.

use crate::connection::ConnectionInfo;
use crate::core::Evaluator;
use strum_macros::{Display, EnumIter, IntoStaticStr};

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum DisconnectReason {
    /// The client closed its side of the connection.
    PeerClosed,
    /// The client sent end-of-transmission or the evaluator asked to exit.
    EndOfTransmission,
    /// Reading from or writing to the socket failed.
    TransportError,
    /// The session or its evaluator failed.
    SessionError,
}

/// Supplies evaluators for new sessions and observes connection lifecycle.
///
/// All methods run on the server loop's task. They must not block: a slow
/// hook delays every connected client.
pub trait ConsoleHandler: Send + Sync + 'static {
    type Evaluator: Evaluator;

    /// Builds the evaluator for a freshly accepted connection.
    fn evaluator(&self, info: &ConnectionInfo) -> Self::Evaluator;

    /// Called once the session has been greeted and registered.
    fn on_connect(&self, _info: &ConnectionInfo) {}

    /// Called after a session has been torn down and its socket closed.
    fn on_disconnect(&self, _info: &ConnectionInfo, _reason: DisconnectReason) {}
}
