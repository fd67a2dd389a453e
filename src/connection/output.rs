// src/connection/output.rs

//! Defines `SessionOutput`, the buffer evaluators and prompts write into.

use crate::core::protocol::write_output;
use bytes::{Bytes, BytesMut};

/// Output produced for one session, already in wire form (`\r\n` line endings).
///
/// The connection handler flushes it to the socket right after every `start`
/// or `feed` call, so it never outlives one dispatch.
#[derive(Debug, Default)]
pub struct SessionOutput {
    buf: BytesMut,
}

impl SessionOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text`, expanding every line terminator to `\r\n`.
    pub fn write(&mut self, text: &str) {
        write_output(text, &mut self.buf);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// The bytes written so far and not yet taken.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Removes and returns everything written so far.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
