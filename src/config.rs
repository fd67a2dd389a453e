// src/config.rs

//! Manages server configuration: loading from TOML, defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// How a completed line that is not valid UTF-8 is handled before it reaches the evaluator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DecodePolicy {
    /// Invalid sequences are replaced with U+FFFD and the line is dispatched.
    #[default]
    Replace,
    /// The line is dropped and an error line is written to the client.
    Reject,
}

/// Per-session console presentation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    /// Greeting written on connect. When unset, the evaluator supplies its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// The primary prompt.
    #[serde(default = "default_ps1")]
    pub ps1: String,
    /// The prompt shown while the evaluator expects a continuation line.
    #[serde(default = "default_ps2")]
    pub ps2: String,
    #[serde(default)]
    pub decode_policy: DecodePolicy,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            banner: None,
            ps1: default_ps1(),
            ps2: default_ps2(),
            decode_policy: DecodePolicy::default(),
        }
    }
}

fn default_ps1() -> String {
    ">>> ".to_string()
}
fn default_ps2() -> String {
    "... ".to_string()
}

/// Diagnostics for the telnet control sequences clients send.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TelnetConfig {
    /// Log every stripped control sequence at debug level.
    #[serde(default = "default_log_negotiation")]
    pub log_negotiation: bool,
    /// Also write a `TELNET: ...` line back to the client for each stripped sequence.
    #[serde(default)]
    pub echo_negotiation: bool,
}

impl Default for TelnetConfig {
    fn default() -> Self {
        Self {
            log_negotiation: default_log_negotiation(),
            echo_negotiation: false,
        }
    }
}

fn default_log_negotiation() -> bool {
    true
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    7071
}

/// The complete server configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    /// `0` binds an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen backlog for pending connections.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Upper bound on how long one loop iteration waits for readiness before
    /// re-checking the stop flag.
    #[serde(with = "humantime_serde", default = "default_poll_timeout")]
    pub poll_timeout: Duration,
    /// Maximum number of bytes read from one client per readiness event.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub telnet: TelnetConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    7070
}
fn default_backlog() -> u32 {
    5
}
fn default_poll_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_read_chunk_size() -> usize {
    1024
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
            poll_timeout: default_poll_timeout(),
            read_chunk_size: default_read_chunk_size(),
            log_level: default_log_level(),
            console: ConsoleConfig::default(),
            telnet: TelnetConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.backlog == 0 {
            return Err(anyhow!("backlog cannot be 0"));
        }
        if self.read_chunk_size == 0 {
            return Err(anyhow!("read_chunk_size cannot be 0"));
        }
        if self.poll_timeout.is_zero() {
            return Err(anyhow!("poll_timeout cannot be 0"));
        }
        if self.console.ps1.is_empty() {
            return Err(anyhow!("console.ps1 cannot be empty"));
        }
        if self.console.ps2.is_empty() {
            return Err(anyhow!("console.ps2 cannot be empty"));
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }
}
