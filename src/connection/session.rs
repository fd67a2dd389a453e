// src/connection/session.rs

//! Defines the line-buffering state machine of a single client session.

use super::ConnectionId;
use super::output::SessionOutput;
use crate::config::{ConsoleConfig, DecodePolicy};
use crate::core::metrics;
use crate::core::protocol::EOT;
use crate::core::{ConsoleError, Evaluator, EvaluatorError};
use bytes::BytesMut;
use std::borrow::Cow;
use tracing::debug;

const LF: u8 = b'\n';

/// The two prompts a session alternates between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub primary: String,
    pub continuation: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self::from(&ConsoleConfig::default())
    }
}

impl From<&ConsoleConfig> for Prompts {
    fn from(config: &ConsoleConfig) -> Self {
        Self {
            primary: config.ps1.clone(),
            continuation: config.ps2.clone(),
        }
    }
}

/// What the connection should do after a chunk has been fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Keep the session open.
    Continue,
    /// The client sent end-of-transmission or the evaluator asked to exit.
    Terminate,
}

/// The result of one `Session::feed` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOutcome {
    /// Bytes taken from the chunk. Always the whole chunk: partial lines stay buffered.
    pub consumed: usize,
    /// Completed lines handed to the evaluator.
    pub lines: usize,
    pub dispatch: Dispatch,
}

/// Holds the state of one interactive session: the partial line received so
/// far, whether the evaluator expects a continuation line, and the evaluator.
///
/// Between `feed` calls the buffer never holds a complete line.
#[derive(Debug)]
pub struct Session<E> {
    id: ConnectionId,
    buffer: BytesMut,
    needs_more: bool,
    evaluator: E,
    prompts: Prompts,
    decode_policy: DecodePolicy,
    output: SessionOutput,
    closed: bool,
}

impl<E: Evaluator> Session<E> {
    pub fn new(id: ConnectionId, evaluator: E, prompts: Prompts, decode_policy: DecodePolicy) -> Self {
        Self {
            id,
            buffer: BytesMut::new(),
            needs_more: false,
            evaluator,
            prompts,
            decode_policy,
            output: SessionOutput::new(),
            closed: false,
        }
    }

    /// Writes the greeting and the first primary prompt. Without an explicit
    /// banner the evaluator's own is used.
    pub fn start(&mut self, banner: Option<&str>) {
        let banner = match banner {
            Some(text) => text.to_string(),
            None => self.evaluator.banner(),
        };
        self.output.write(&banner);
        self.output.write("\n");
        self.output.write(&self.prompts.primary);
    }

    /// Appends `bytes` to the pending input and dispatches every line it completes.
    ///
    /// Exactly one prompt is written per call that completes at least one line,
    /// after the last of them, so clients that deliver several lines in one
    /// read do not see a prompt between each.
    ///
    /// The pending partial line is not capped. A client that never sends `\n`
    /// grows it with every read, the same way an unread client stalls writes.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<FeedOutcome, ConsoleError> {
        if self.closed {
            return Err(ConsoleError::SessionClosed);
        }

        self.buffer.extend_from_slice(bytes);
        let mut outcome = FeedOutcome {
            consumed: bytes.len(),
            lines: 0,
            dispatch: Dispatch::Continue,
        };

        let Some(last_lf) = self.buffer.iter().rposition(|&b| b == LF) else {
            return Ok(outcome);
        };
        let complete = self.buffer.split_to(last_lf + 1).freeze();

        for raw in complete[..last_lf].split(|&b| b == LF) {
            if raw == [EOT] {
                debug!("Session {}: end of transmission received.", self.id);
                outcome.dispatch = Dispatch::Terminate;
                return Ok(outcome);
            }

            let Some(line) = self.decode(raw) else {
                continue;
            };

            debug!("Session {}: dispatching line {:?}", self.id, line);
            metrics::LINES_DISPATCHED_TOTAL.inc();
            outcome.lines += 1;
            match self.evaluator.push(&line, &mut self.output) {
                Ok(more) => self.needs_more = more,
                Err(EvaluatorError::Exit) => {
                    debug!("Session {}: evaluator requested exit.", self.id);
                    outcome.dispatch = Dispatch::Terminate;
                    return Ok(outcome);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let prompt = if self.needs_more {
            &self.prompts.continuation
        } else {
            &self.prompts.primary
        };
        self.output.write(prompt);
        Ok(outcome)
    }

    /// Turns raw line bytes into text according to the decode policy. `None`
    /// means the line was rejected and must not be dispatched.
    fn decode<'a>(&mut self, raw: &'a [u8]) -> Option<Cow<'a, str>> {
        match self.decode_policy {
            DecodePolicy::Replace => Some(String::from_utf8_lossy(raw)),
            DecodePolicy::Reject => match std::str::from_utf8(raw) {
                Ok(text) => Some(Cow::Borrowed(text)),
                Err(e) => {
                    debug!("Session {}: rejecting undecodable line: {}", self.id, e);
                    self.output
                        .write("Error: input line is not valid UTF-8 and was discarded\n");
                    None
                }
            },
        }
    }

    /// Drops buffered input and unsent output. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.buffer.clear();
        self.output.clear();
        self.needs_more = false;
        debug!("Session {} closed.", self.id);
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True when the evaluator expects a continuation line.
    pub fn needs_continuation(&self) -> bool {
        self.needs_more
    }

    /// Bytes received that do not yet form a complete line.
    pub fn pending_input(&self) -> &[u8] {
        &self.buffer
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn output(&self) -> &SessionOutput {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut SessionOutput {
        &mut self.output
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut E {
        &mut self.evaluator
    }
}
