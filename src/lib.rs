// src/lib.rs

pub mod config;
pub mod connection;
pub mod core;
pub mod server;

// Re-export
pub use crate::config::Config;
pub use crate::server::{ConsoleHandle, ConsoleHandler, ConsoleServer};
