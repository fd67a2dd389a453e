// src/core/protocol/sanitizer.rs

//! Translates between wire bytes (telnet control sequences, `\r\n` line endings)
//! and logical bytes (plain text, `\n` line endings).

use super::telnet::{ControlSequence, IAC};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Strips control sequences out of one connection's inbound byte stream.
///
/// The sanitizer is stateful: a control sequence or a `\r\n` pair that is cut
/// by a read boundary is held back until the rest of it arrives, so feeding a
/// stream in arbitrary chunks yields the same bytes as feeding it whole.
#[derive(Debug, Default)]
pub struct TelnetSanitizer {
    /// An escape byte that arrived without its two trailing bytes, plus anything after it.
    raw_tail: BytesMut,
    /// A `\r` that ended the previous output and may pair with a leading `\n`.
    pending_cr: bool,
    /// Sequences stripped since the last `take_sequences` call.
    sequences: Vec<ControlSequence>,
    log_negotiation: bool,
}

impl TelnetSanitizer {
    pub fn new(log_negotiation: bool) -> Self {
        Self {
            log_negotiation,
            ..Self::default()
        }
    }

    /// Removes every complete control sequence from `chunk` and normalizes
    /// `\r\n` to `\n`. Incomplete sequences and a trailing `\r` are carried
    /// over to the next call.
    pub fn sanitize_input(&mut self, chunk: &[u8]) -> Bytes {
        self.raw_tail.extend_from_slice(chunk);
        let input = self.raw_tail.split();

        let mut stripped = BytesMut::with_capacity(input.len() + 1);
        if std::mem::take(&mut self.pending_cr) {
            stripped.put_u8(CR);
        }

        let mut rest = &input[..];
        loop {
            match rest.iter().position(|&b| b == IAC) {
                Some(pos) if pos + 3 <= rest.len() => {
                    stripped.extend_from_slice(&rest[..pos]);
                    self.record(ControlSequence::new(rest[pos + 1], rest[pos + 2]));
                    rest = &rest[pos + 3..];
                }
                Some(pos) => {
                    stripped.extend_from_slice(&rest[..pos]);
                    self.raw_tail.extend_from_slice(&rest[pos..]);
                    break;
                }
                None => {
                    stripped.extend_from_slice(rest);
                    break;
                }
            }
        }

        if stripped.last() == Some(&CR) {
            stripped.truncate(stripped.len() - 1);
            self.pending_cr = true;
        }

        normalize_crlf(&stripped)
    }

    /// Drains the control sequences stripped since the previous call.
    pub fn take_sequences(&mut self) -> Vec<ControlSequence> {
        std::mem::take(&mut self.sequences)
    }

    /// True if bytes are being held back waiting for the rest of a sequence or line ending.
    pub fn has_pending(&self) -> bool {
        self.pending_cr || !self.raw_tail.is_empty()
    }

    fn record(&mut self, seq: ControlSequence) {
        if self.log_negotiation {
            debug!("TELNET: {}", seq);
        }
        self.sequences.push(seq);
    }
}

/// Collapses every `\r\n` pair into `\n`. Lone `\r` bytes are kept.
fn normalize_crlf(src: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        if src[i] == CR && src.get(i + 1) == Some(&LF) {
            i += 1;
            continue;
        }
        out.put_u8(src[i]);
        i += 1;
    }
    out.freeze()
}

/// Expands every logical line terminator in `text` to the wire's `\r\n`.
pub fn sanitize_output(text: &str) -> Bytes {
    let mut out = BytesMut::with_capacity(text.len() + 8);
    write_output(text, &mut out);
    out.freeze()
}

/// Appends `text` to `dst`, turning `\n` and `\r\n` alike into `\r\n`.
pub fn write_output(text: &str, dst: &mut BytesMut) {
    let src = text.as_bytes();
    dst.reserve(src.len());
    let mut i = 0;
    while i < src.len() {
        match src[i] {
            CR if src.get(i + 1) == Some(&LF) => {}
            LF => dst.put_slice(b"\r\n"),
            b => dst.put_u8(b),
        }
        i += 1;
    }
}
