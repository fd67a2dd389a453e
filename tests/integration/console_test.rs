// tests/integration/console_test.rs

//! End-to-end tests of line handling over real telnet-style connections.

use super::test_helpers::{Event, RecordingHandler, TestServer, wait_until};
use std::time::Duration;
use telconsole::core::evaluator::CalculatorHandler;

#[tokio::test]
async fn test_greeting_uses_evaluator_banner() {
    let handler = RecordingHandler::default();
    let server = TestServer::start(handler.clone()).await;

    let mut client = server.connect_raw().await;
    let greeting = client.read_until(">>> ").await;
    assert_eq!(greeting, "recording session 1\r\n>>> ");
    let recorded = handler.clone();
    wait_until(move || recorded.connected().len() == 1).await;

    server.stop().await;
}

#[tokio::test]
async fn test_greeting_uses_configured_banner() {
    let mut config = TestServer::config();
    config.console.banner = Some("Welcome".to_string());
    let server = TestServer::with_config(config, CalculatorHandler::default()).await;

    let mut client = server.connect_raw().await;
    assert_eq!(client.read_until(">>> ").await, "Welcome\r\n>>> ");

    server.stop().await;
}

#[tokio::test]
async fn test_expression_is_evaluated() {
    let server = TestServer::start(CalculatorHandler::default()).await;
    let mut client = server.connect().await;

    assert_eq!(client.command("1+1", ">>> ").await, "2\r\n>>> ");
    assert_eq!(client.command("2 * (3 + 4)", ">>> ").await, "14\r\n>>> ");

    server.stop().await;
}

#[tokio::test]
async fn test_negotiation_is_stripped_before_dispatch() {
    let handler = RecordingHandler::default();
    let server = TestServer::start(handler.clone()).await;
    let mut client = server.connect().await;

    client.send(&[255, 251, 1, b'h', b'i', b'\r', b'\n']).await;
    assert_eq!(client.read_until(">>> ").await, ">>> ");

    let lines: Vec<String> = handler.lines().into_iter().map(|(_, l)| l).collect();
    assert_eq!(lines, vec!["hi"]);

    server.stop().await;
}

#[tokio::test]
async fn test_negotiation_split_across_writes() {
    let handler = RecordingHandler::default();
    let server = TestServer::start(handler.clone()).await;
    let mut client = server.connect().await;

    client.send(&[255]).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    client.send(&[251]).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    client.send(&[1, b'o', b'k', b'\r']).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    client.send(b"\n").await;
    client.read_until(">>> ").await;

    let lines: Vec<String> = handler.lines().into_iter().map(|(_, l)| l).collect();
    assert_eq!(lines, vec!["ok"]);

    server.stop().await;
}

#[tokio::test]
async fn test_negotiation_echo() {
    let mut config = TestServer::config();
    config.telnet.echo_negotiation = true;
    let server = TestServer::with_config(config, CalculatorHandler::default()).await;
    let mut client = server.connect().await;

    client.send(&[255, 251, 1]).await;
    let echoed = client.read_until("\r\n").await;
    assert_eq!(echoed, "TELNET: Command/Option = 251/1, WILL/ECHO\r\n");

    server.stop().await;
}

#[tokio::test]
async fn test_partial_lines_are_kept_per_connection() {
    let handler = RecordingHandler::default();
    let server = TestServer::start(handler.clone()).await;
    let mut first = server.connect().await;
    let mut second = server.connect().await;
    let recorded = handler.clone();
    wait_until(move || recorded.connected().len() == 2).await;
    let ids = handler.connected();

    first.send(b"par").await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(handler.lines().is_empty());

    second.command("other", ">>> ").await;
    first.command("tial", ">>> ").await;

    assert_eq!(
        handler.lines(),
        vec![(ids[1], "other".to_string()), (ids[0], "partial".to_string())]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_multiple_lines_in_one_write() {
    let server = TestServer::start(CalculatorHandler::default()).await;
    let mut client = server.connect().await;

    client.send(b"a = 1\r\nb = 2\r\na + b\r\n").await;
    let response = client.read_until("3\r\n>>> ").await;
    assert!(response.ends_with("3\r\n>>> "));

    server.stop().await;
}

#[tokio::test]
async fn test_continuation_prompt() {
    let server = TestServer::start(CalculatorHandler::default()).await;
    let mut client = server.connect().await;

    assert_eq!(client.command("(1 +", "... ").await, "... ");
    assert_eq!(client.command("2)", ">>> ").await, "3\r\n>>> ");

    server.stop().await;
}

#[tokio::test]
async fn test_custom_prompts() {
    let mut config = TestServer::config();
    config.console.ps1 = "calc> ".to_string();
    config.console.ps2 = "  ... ".to_string();
    let server = TestServer::with_config(config, CalculatorHandler::default()).await;

    let mut client = server.connect_raw().await;
    client.read_until("calc> ").await;
    assert_eq!(client.command("(2", "  ... ").await, "  ... ");
    assert_eq!(client.command(")", "calc> ").await, "2\r\ncalc> ");

    server.stop().await;
}

#[tokio::test]
async fn test_namespace_is_shared_between_sessions() {
    let handler = CalculatorHandler::default();
    let server = TestServer::start(handler.clone()).await;
    let mut first = server.connect().await;
    let mut second = server.connect().await;

    assert_eq!(first.command("a = 10", ">>> ").await, ">>> ");
    assert_eq!(second.command("a + 5", ">>> ").await, "15\r\n>>> ");
    assert_eq!(handler.namespace().get("a"), Some(10.0));

    server.stop().await;
}

#[tokio::test]
async fn test_evaluator_errors_are_reported_in_band() {
    let server = TestServer::start(CalculatorHandler::default()).await;
    let mut client = server.connect().await;

    assert_eq!(
        client.command("nope", ">>> ").await,
        "Error: name 'nope' is not defined\r\n>>> "
    );
    assert_eq!(client.command("4 / 2", ">>> ").await, "2\r\n>>> ");

    server.stop().await;
}

#[tokio::test]
async fn test_lines_from_many_clients_are_all_dispatched() {
    let handler = RecordingHandler::default();
    let server = TestServer::start(handler.clone()).await;

    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(server.connect().await);
    }
    for (i, client) in clients.iter_mut().enumerate() {
        client.send(format!("line {i}\r\n").as_bytes()).await;
    }
    for client in clients.iter_mut() {
        client.read_until(">>> ").await;
    }

    let mut lines: Vec<String> = handler.lines().into_iter().map(|(_, l)| l).collect();
    lines.sort();
    assert_eq!(lines, vec!["line 0", "line 1", "line 2", "line 3", "line 4"]);
    assert!(
        handler
            .events()
            .iter()
            .all(|e| !matches!(e, Event::Disconnected(..)))
    );

    server.stop().await;
}
