// src/core/errors.rs

//! Defines the primary error type for the console server.

use crate::core::evaluator::EvaluatorError;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all failures the loop and its sessions can surface.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Could not resolve listen address '{0}'")]
    AddressResolution(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Evaluator failed: {0}")]
    Evaluator(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

// `std::io::Error` is not cloneable, so the Io variant shares it through an Arc.
impl Clone for ConsoleError {
    fn clone(&self) -> Self {
        match self {
            ConsoleError::Io(e) => ConsoleError::Io(Arc::clone(e)),
            ConsoleError::InvalidConfig(s) => ConsoleError::InvalidConfig(s.clone()),
            ConsoleError::AddressResolution(s) => ConsoleError::AddressResolution(s.clone()),
            ConsoleError::SessionClosed => ConsoleError::SessionClosed,
            ConsoleError::Evaluator(s) => ConsoleError::Evaluator(s.clone()),
            ConsoleError::Internal(s) => ConsoleError::Internal(s.clone()),
        }
    }
}

impl PartialEq for ConsoleError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConsoleError::Io(e1), ConsoleError::Io(e2)) => e1.kind() == e2.kind(),
            (ConsoleError::InvalidConfig(s1), ConsoleError::InvalidConfig(s2)) => s1 == s2,
            (ConsoleError::AddressResolution(s1), ConsoleError::AddressResolution(s2)) => {
                s1 == s2
            }
            (ConsoleError::Evaluator(s1), ConsoleError::Evaluator(s2)) => s1 == s2,
            (ConsoleError::Internal(s1), ConsoleError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl ConsoleError {
    /// True for transport errors that only mean the peer went away.
    pub fn is_normal_disconnect(&self) -> bool {
        matches!(self, ConsoleError::Io(e) if matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionAborted
        ))
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for ConsoleError {
    fn from(e: std::io::Error) -> Self {
        ConsoleError::Io(Arc::new(e))
    }
}

impl From<EvaluatorError> for ConsoleError {
    fn from(e: EvaluatorError) -> Self {
        match e {
            EvaluatorError::Exit => {
                ConsoleError::Internal("evaluator exit escaped the session".to_string())
            }
            EvaluatorError::Failed(msg) => ConsoleError::Evaluator(msg),
        }
    }
}
