// src/core/evaluator/mod.rs

//! The boundary between the console loop and whatever interprets completed lines.
//!
//! The loop hands every completed line to `Evaluator::push` and writes whatever
//! the evaluator emitted through `SessionOutput` back to the client. `push` runs
//! on the loop's only task, so it must return promptly: a slow evaluator stalls
//! every connected client.

pub mod calculator;
pub mod expr;

pub use calculator::{Calculator, CalculatorHandler, Namespace};

use crate::connection::SessionOutput;
use thiserror::Error;

/// Failures an evaluator can report back to its session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluatorError {
    /// The evaluator wants the session to end, like an `exit` command.
    #[error("evaluator requested exit")]
    Exit,

    /// The evaluator is no longer usable; the session is torn down.
    #[error("{0}")]
    Failed(String),
}

/// An interactive line interpreter driven by one session.
pub trait Evaluator: Send + 'static {
    /// Consumes one completed line. Returns `true` when the evaluator needs
    /// more lines before it can act on what it has been given.
    ///
    /// Ordinary runtime errors belong in `out` as text. Returning `Err` ends
    /// the session.
    fn push(&mut self, line: &str, out: &mut SessionOutput) -> Result<bool, EvaluatorError>;

    /// The greeting written when a session starts, unless the configuration overrides it.
    fn banner(&self) -> String {
        format!(
            "{} {} on {}\nType \"help\" for more information.",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        )
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn push(&mut self, line: &str, out: &mut SessionOutput) -> Result<bool, EvaluatorError> {
        (**self).push(line, out)
    }

    fn banner(&self) -> String {
        (**self).banner()
    }
}
