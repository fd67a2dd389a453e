// src/core/mod.rs

//! The protocol, evaluator and error building blocks the server is assembled from.

pub mod errors;
pub mod evaluator;
pub mod metrics;
pub mod protocol;

pub use errors::ConsoleError;
pub use evaluator::{Evaluator, EvaluatorError};
pub use protocol::{ControlSequence, TelnetSanitizer};
