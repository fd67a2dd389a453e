// src/core/protocol/telnet.rs

//! Telnet command and option codes, and the 3-byte control sequence they form.
//!
//! Requests and responses for options share one shape:
//!
//! ```text
//! +-----+-------------------+--------+
//! | IAC | Operation/Command | Option |
//! +-----+-------------------+--------+
//! ```
//!
//! Only enough of the table is named to make diagnostics readable. Any byte
//! value is accepted; unnamed ones print as `Unknown`.

use std::fmt;
use strum_macros::{Display, FromRepr};

/// Interpret As Command: the escape byte that starts every control sequence.
pub const IAC: u8 = 255;

/// The end-of-transmission byte (Ctrl-D). A line holding only this byte ends the session.
pub const EOT: u8 = 0x04;

/// Telnet command bytes (RFC 854).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TelnetCommand {
    Se = 240,
    Nop = 241,
    Dm = 242,
    Brk = 243,
    Ip = 244,
    Ao = 245,
    Ayt = 246,
    Ec = 247,
    El = 248,
    Ga = 249,
    Sb = 250,
    Will = 251,
    Wont = 252,
    Do = 253,
    Dont = 254,
    Iac = 255,
}

/// Telnet option codes a typical client offers during connection setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TelnetOption {
    /// RFC 857
    Echo = 1,
    /// RFC 858
    SuppressGoAhead = 3,
    /// RFC 859
    Status = 5,
    /// RFC 860
    TimingMark = 6,
    /// RFC 1091
    TerminalType = 24,
    /// RFC 1073
    WindowSize = 31,
    /// RFC 1079
    TerminalSpeed = 32,
    /// RFC 1372
    RemoteFlowControl = 33,
    /// RFC 1184
    Linemode = 34,
    /// RFC 1408
    EnvironmentVariables = 36,
}

/// One `IAC command option` triple lifted out of the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSequence {
    pub command: u8,
    pub option: u8,
}

impl ControlSequence {
    pub fn new(command: u8, option: u8) -> Self {
        Self { command, option }
    }

    /// The decoded command, if the byte is one we have a name for.
    pub fn command(&self) -> Option<TelnetCommand> {
        TelnetCommand::from_repr(self.command)
    }

    /// The decoded option, if the byte is one we have a name for.
    pub fn option(&self) -> Option<TelnetOption> {
        TelnetOption::from_repr(self.option)
    }

    /// Label for the command byte, `Unknown` when unnamed.
    pub fn command_label(&self) -> String {
        self.command()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Label for the option byte, `Unknown` when unnamed.
    pub fn option_label(&self) -> String {
        self.option()
            .map(|o| o.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// The raw wire form of this sequence.
    pub fn to_bytes(&self) -> [u8; 3] {
        [IAC, self.command, self.option]
    }
}

impl fmt::Display for ControlSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Command/Option = {}/{}, {}/{}",
            self.command,
            self.option,
            self.command_label(),
            self.option_label()
        )
    }
}
