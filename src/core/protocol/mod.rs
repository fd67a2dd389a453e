// src/core/protocol/mod.rs

pub mod sanitizer;
pub mod telnet;
pub use sanitizer::{TelnetSanitizer, sanitize_output, write_output};
pub use telnet::{ControlSequence, EOT, IAC, TelnetCommand, TelnetOption};
