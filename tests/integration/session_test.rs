// tests/integration/session_test.rs

//! End-to-end sessions over an in-memory pipe: greeting, validation,
//! dispatch, timeouts, and teardown.

use super::test_helpers::*;
use smtplane::config::{Config, MIN_MAX_LINE_BYTES};
use smtplane::connection::UpgradeState;
use std::time::Duration;

#[tokio::test]
async fn test_greeting_names_identity_and_port() {
    let mut config = Config::default();
    config.identity = "mx.example.org".to_string();
    let ctx = TestContext::with_config(config);
    let mut session = ctx.connect();
    assert_eq!(
        session.client.recv().await,
        "220 mx.example.org Service Ready at port 2525"
    );
}

#[tokio::test]
async fn test_unknown_command_keeps_session_open() {
    let ctx = TestContext::new();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(session.client.command("XXXX").await, "500 Command not recognized");
    assert_eq!(session.client.command("NOOP").await, "250 OK");
}

#[tokio::test]
async fn test_short_line_is_invalid() {
    let ctx = TestContext::new();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(
        session.client.command("AB").await,
        "500 Invalid command. Must be 4 characters"
    );
    assert_eq!(
        session.client.command("").await,
        "500 Invalid command. Must be 4 characters"
    );
    assert_eq!(session.client.command("NOOP").await, "250 OK");
}

#[tokio::test]
async fn test_fifth_character_must_be_a_space() {
    let ctx = TestContext::new();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(
        session.client.command("NOOPS").await,
        "500 Invalid command. Must be 4 characters"
    );
    assert_eq!(
        session.client.command("HELO:example.com").await,
        "500 Invalid command. Must be 4 characters"
    );
}

#[tokio::test]
async fn test_command_over_1000_characters_is_too_long() {
    let ctx = TestContext::new();
    let mut session = ctx.connect_and_greet().await;

    let at_limit = format!("NOOP {}", "a".repeat(995));
    assert_eq!(at_limit.chars().count(), 1000);
    assert_eq!(session.client.command(&at_limit).await, "250 OK");

    let over_limit = format!("NOOP {}", "a".repeat(996));
    assert_eq!(
        session.client.command(&over_limit).await,
        "500 Command too long. 1000 character maximum."
    );
}

#[tokio::test]
async fn test_line_over_byte_cap_is_discarded_and_reading_continues() {
    let mut config = Config::default();
    config.max_line_bytes = MIN_MAX_LINE_BYTES;
    let ctx = TestContext::with_config(config);
    let mut session = ctx.connect_and_greet().await;

    let huge = format!("NOOP {}", "x".repeat(10_000));
    assert_eq!(
        session.client.command(&huge).await,
        "500 Command too long. 1000 character maximum."
    );
    assert_eq!(session.client.command("NOOP").await, "250 OK");
}

#[tokio::test]
async fn test_multibyte_line_within_1000_characters_is_dispatched_at_smallest_cap() {
    let mut config = Config::default();
    config.max_line_bytes = MIN_MAX_LINE_BYTES;
    config.validate().unwrap();
    let ctx = TestContext::with_config(config);
    let mut session = ctx.connect_and_greet().await;

    let two_byte = format!("NOOP {}", "é".repeat(600));
    assert!(two_byte.len() > 1000);
    assert_eq!(session.client.command(&two_byte).await, "250 OK");

    let four_byte = format!("NOOP {}", "😀".repeat(995));
    assert_eq!(four_byte.chars().count(), 1000);
    assert!(four_byte.len() <= MIN_MAX_LINE_BYTES);
    assert_eq!(session.client.command(&four_byte).await, "250 OK");

    let over = format!("NOOP {}", "😀".repeat(996));
    assert_eq!(
        session.client.command(&over).await,
        "500 Command too long. 1000 character maximum."
    );
}

#[tokio::test]
async fn test_tokens_are_case_insensitive() {
    let ctx = TestContext::new();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(session.client.command("noop").await, "250 OK");
    assert_eq!(session.client.command("nOoP").await, "250 OK");
    assert_eq!(
        session.client.command("helo client.example").await,
        "250 localhost"
    );
}

#[tokio::test]
async fn test_ehlo_without_tls_does_not_offer_starttls() {
    let ctx = TestContext::new();
    let mut session = ctx.connect_and_greet().await;
    session.client.send("EHLO client.example").await;
    assert_eq!(session.client.recv().await, "250-localhost");
    assert_eq!(session.client.recv().await, "250-8BITMIME");
    assert_eq!(session.client.recv().await, "250 SIZE 10485760");
}

#[tokio::test]
async fn test_ehlo_with_tls_offers_starttls() {
    let ctx = TestContext::with_tls();
    let mut session = ctx.connect_and_greet().await;
    session.client.send("EHLO client.example").await;
    assert_eq!(session.client.recv().await, "250-localhost");
    assert_eq!(session.client.recv().await, "250-8BITMIME");
    assert_eq!(session.client.recv().await, "250-STARTTLS");
    assert_eq!(session.client.recv().await, "250 SIZE 10485760");
}

#[tokio::test]
async fn test_quit_closes_connection() {
    let ctx = TestContext::new();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(
        session.client.command("QUIT").await,
        "221 localhost Service closing transmission channel"
    );
    session.client.expect_closed().await;
    assert!(session.control.is_closed());
    session.finished().await;
    assert!(ctx.state.clients.is_empty());
}

#[tokio::test]
async fn test_read_timeout_sends_421_and_closes() {
    let mut config = Config::default();
    config.read_timeout = Duration::from_millis(200);
    let ctx = TestContext::with_config(config);
    let mut session = ctx.connect_and_greet().await;

    assert_eq!(
        session.client.recv().await,
        "421 Service shutting down and closing transmission channel"
    );
    session.client.expect_closed().await;
    session.finished().await;
}

#[tokio::test]
async fn test_peer_disconnect_ends_session() {
    let ctx = TestContext::new();
    let session = ctx.connect_and_greet().await;
    let TestSession {
        client,
        control,
        task,
    } = session;
    drop(client);

    tokio::time::timeout(REPLY_TIMEOUT, task)
        .await
        .expect("session did not end after disconnect")
        .unwrap();
    assert!(control.is_closed());
}

#[tokio::test]
async fn test_external_close_is_idempotent() {
    let ctx = TestContext::new();
    let mut session = ctx.connect_and_greet().await;
    wait_until(|| ctx.state.clients.len() == 1).await;

    session.control.close();
    session.control.close();
    session.client.expect_closed().await;
    session.control.close();
    assert_eq!(session.control.upgrade_state(), UpgradeState::Closed);
    session.finished().await;
    assert!(ctx.state.clients.is_empty());
}

#[tokio::test]
async fn test_client_is_registered_while_session_runs() {
    let ctx = TestContext::new();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(session.client.command("NOOP").await, "250 OK");

    assert_eq!(ctx.state.clients.len(), 1);
    let entry = ctx.state.clients.iter().next().unwrap();
    assert_eq!(entry.value().0.addr.port(), 40000);
    drop(entry);

    assert!(session.client.command("QUIT").await.starts_with("221 "));
    session.finished().await;
    assert!(ctx.state.clients.is_empty());
}

#[tokio::test]
async fn test_commands_are_counted() {
    let ctx = TestContext::new();
    let mut session = ctx.connect_and_greet().await;
    session.client.command("NOOP").await;
    session.client.command("XXXX").await;
    session.client.command("AB").await;
    session.client.command("RSET").await;
    assert_eq!(ctx.state.stats.get_total_commands(), 2);
}
