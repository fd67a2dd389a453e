// tests/integration/test_helpers.rs

//! Test helpers for driving a live console server over real TCP sockets.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telconsole::config::Config;
use telconsole::connection::{ConnectionId, ConnectionInfo, SessionOutput};
use telconsole::core::{ConsoleError, Evaluator, EvaluatorError};
use telconsole::server::{ConsoleHandle, ConsoleHandler, ConsoleServer, DisconnectReason, ServerExit};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// How long any single wait in a test may take before it is considered hung.
pub const WAIT: Duration = Duration::from_secs(2);

/// A lifecycle or dispatch event seen by a `RecordingHandler`.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected(ConnectionId),
    Line(ConnectionId, String),
    Disconnected(ConnectionId, DisconnectReason),
}

/// A handler whose evaluators record every line they are given.
///
/// `"boom"` makes the evaluator fail and a line ending in `':'` asks for a
/// continuation line. Nothing else is written back besides the prompts.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingHandler {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Every dispatched line, in dispatch order.
    pub fn lines(&self) -> Vec<(ConnectionId, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Line(id, line) => Some((id, line)),
                _ => None,
            })
            .collect()
    }

    pub fn disconnects(&self) -> Vec<(ConnectionId, DisconnectReason)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Disconnected(id, reason) => Some((id, reason)),
                _ => None,
            })
            .collect()
    }

    /// The ids of connected sessions, in connect order.
    pub fn connected(&self) -> Vec<ConnectionId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Connected(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct RecordingEvaluator {
    id: ConnectionId,
    handler: RecordingHandler,
}

impl Evaluator for RecordingEvaluator {
    fn push(&mut self, line: &str, _out: &mut SessionOutput) -> Result<bool, EvaluatorError> {
        self.handler.record(Event::Line(self.id, line.to_string()));
        if line == "boom" {
            return Err(EvaluatorError::Failed("boom".to_string()));
        }
        Ok(line.ends_with(':'))
    }

    fn banner(&self) -> String {
        format!("recording session {}", self.id)
    }
}

impl ConsoleHandler for RecordingHandler {
    type Evaluator = RecordingEvaluator;

    fn evaluator(&self, info: &ConnectionInfo) -> RecordingEvaluator {
        RecordingEvaluator {
            id: info.id,
            handler: self.clone(),
        }
    }

    fn on_connect(&self, info: &ConnectionInfo) {
        self.record(Event::Connected(info.id));
    }

    fn on_disconnect(&self, info: &ConnectionInfo, reason: DisconnectReason) {
        self.record(Event::Disconnected(info.id, reason));
    }
}

/// A server running on an ephemeral loopback port.
pub struct TestServer {
    pub handle: ConsoleHandle,
    pub addr: SocketAddr,
    task: JoinHandle<Result<ServerExit, ConsoleError>>,
}

impl TestServer {
    /// A loopback configuration with a short poll interval.
    pub fn config() -> Config {
        let mut config = Config::default();
        config.host = "127.0.0.1".to_string();
        config.port = 0;
        config.poll_timeout = Duration::from_millis(50);
        config
    }

    pub async fn start<H: ConsoleHandler>(handler: H) -> Self {
        Self::with_config(Self::config(), handler).await
    }

    pub async fn with_config<H: ConsoleHandler>(config: Config, handler: H) -> Self {
        init_tracing();
        let (handle, task) = ConsoleServer::start(config, handler)
            .await
            .expect("Failed to start console server");
        let addr = handle.local_addr();
        Self { handle, addr, task }
    }

    /// Connects a client and consumes its greeting up to the first prompt.
    pub async fn connect(&self) -> TestClient {
        let mut client = self.connect_raw().await;
        client.read_until(">>> ").await;
        client
    }

    pub async fn connect_raw(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr)
            .await
            .expect("Failed to connect to console server");
        TestClient {
            stream,
            pending: Vec::new(),
        }
    }

    /// Waits until the server reports `count` live sessions.
    pub async fn wait_for_connections(&self, count: usize) {
        let handle = self.handle.clone();
        wait_until(move || handle.connection_count() == count).await;
    }

    /// Requests a stop and waits for the loop to return.
    pub async fn stop(self) -> ServerExit {
        self.handle.stop();
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("Server did not stop in time")
            .expect("Server task panicked")
            .expect("Server loop failed")
    }
}

/// A raw TCP client that accumulates whatever the server sends.
pub struct TestClient {
    stream: TcpStream,
    pending: Vec<u8>,
}

impl TestClient {
    pub async fn send(&mut self, data: &[u8]) {
        self.stream.write_all(data).await.expect("Failed to send");
        self.stream.flush().await.expect("Failed to flush");
    }

    /// Returns everything received up to and including `marker`. Bytes after
    /// the marker are kept for the next call.
    pub async fn read_until(&mut self, marker: &str) -> String {
        let marker = marker.as_bytes();
        loop {
            if let Some(pos) = self
                .pending
                .windows(marker.len())
                .position(|w| w == marker)
            {
                let rest = self.pending.split_off(pos + marker.len());
                let found = std::mem::replace(&mut self.pending, rest);
                return String::from_utf8_lossy(&found).into_owned();
            }

            let mut buf = [0u8; 1024];
            let n = tokio::time::timeout(WAIT, self.stream.read(&mut buf))
                .await
                .unwrap_or_else(|_| {
                    panic!(
                        "Timed out waiting for {:?}; received so far: {:?}",
                        String::from_utf8_lossy(marker),
                        String::from_utf8_lossy(&self.pending)
                    )
                })
                .expect("Read failed");
            assert!(
                n > 0,
                "Connection closed before {:?}; received: {:?}",
                String::from_utf8_lossy(marker),
                String::from_utf8_lossy(&self.pending)
            );
            self.pending.extend_from_slice(&buf[..n]);
        }
    }

    /// Sends one line with a telnet line ending and returns the response up to the next prompt.
    pub async fn command(&mut self, line: &str, prompt: &str) -> String {
        self.send(format!("{line}\r\n").as_bytes()).await;
        self.read_until(prompt).await
    }

    /// Waits for the server to close the connection, discarding any data before the close.
    pub async fn expect_closed(&mut self) -> String {
        let mut received = std::mem::take(&mut self.pending);
        let mut buf = [0u8; 1024];
        loop {
            match tokio::time::timeout(WAIT, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return String::from_utf8_lossy(&received).into_owned(),
                Ok(Ok(n)) => received.extend_from_slice(&buf[..n]),
                Err(_) => panic!("Connection was not closed by the server"),
            }
        }
    }

    /// Asserts that nothing arrives, and the connection stays open, for `duration`.
    pub async fn expect_silence(&mut self, duration: Duration) {
        let mut buf = [0u8; 64];
        if let Ok(res) = tokio::time::timeout(duration, self.stream.read(&mut buf)).await {
            panic!("Expected silence, got {res:?}");
        }
    }
}

/// Polls `condition` until it holds, failing the test after `WAIT`.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("warn"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
