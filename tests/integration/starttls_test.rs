// tests/integration/starttls_test.rs

//! The in-band TLS upgrade: refusals, the happy path, and every way a pending
//! handshake can end.

use super::test_helpers::*;
use smtplane::config::{Config, TlsConfig};
use smtplane::connection::UpgradeState;
use std::time::Duration;

#[tokio::test]
async fn test_starttls_upgrades_and_serves_over_tls() {
    let ctx = TestContext::with_tls();
    let mut session = ctx.connect_and_greet().await;

    assert_eq!(session.client.command("STARTTLS").await, "220 Ready to start TLS");
    let mut tls = session.client.start_tls().await;

    assert_eq!(tls.command("NOOP").await, "250 OK");
    tls.send("EHLO client.example").await;
    assert_eq!(tls.recv().await, "250-localhost");
    assert_eq!(tls.recv().await, "250-8BITMIME");
    // STARTTLS is no longer offered once encrypted.
    assert_eq!(tls.recv().await, "250 SIZE 10485760");

    assert_eq!(session.control.upgrade_state(), UpgradeState::Plain);
    assert_eq!(ctx.state.stats.get_tls_upgrades(), 1);

    assert!(tls.command("QUIT").await.starts_with("221 "));
    tls.expect_closed().await;
    session.task.await.unwrap();
}

#[tokio::test]
async fn test_upgrade_resets_session_state() {
    let ctx = TestContext::with_tls();
    let mut session = ctx.connect_and_greet().await;

    assert_eq!(session.client.command("EHLO client.example").await, "250-localhost");
    for _ in 0..3 {
        session.client.recv().await;
    }
    assert_eq!(
        session.client.command("MAIL FROM:<alice@example.com>").await,
        "250 OK"
    );
    assert_eq!(session.client.command("STARTTLS").await, "220 Ready to start TLS");
    let mut tls = session.client.start_tls().await;

    // The sender given in plaintext does not survive the upgrade.
    assert_eq!(
        tls.command("RCPT TO:<bob@example.com>").await,
        "503 MAIL command required"
    );
    assert_eq!(tls.command("MAIL FROM:<alice@example.com>").await, "250 OK");
}

#[tokio::test]
async fn test_starttls_with_parameters_is_a_syntax_error() {
    let ctx = TestContext::with_tls();
    let mut session = ctx.connect_and_greet().await;

    assert_eq!(
        session.client.command("STARTTLS extra").await,
        "501 Syntax error (no parameters allowed)"
    );
    assert_eq!(
        session.client.command("STARTTLSX").await,
        "501 Syntax error (no parameters allowed)"
    );
    // Still plaintext.
    assert_eq!(session.client.command("NOOP").await, "250 OK");
    assert_eq!(session.control.upgrade_state(), UpgradeState::Plain);
}

#[tokio::test]
async fn test_starttls_over_the_line_cap_is_still_a_syntax_error() {
    let ctx = TestContext::with_tls();
    let mut session = ctx.connect_and_greet().await;

    let line = format!("STARTTLS {}", "x".repeat(70_000));
    assert!(line.len() > ctx.state.max_line_bytes());
    assert_eq!(
        session.client.command(&line).await,
        "501 Syntax error (no parameters allowed)"
    );
    assert_eq!(session.client.command("NOOP").await, "250 OK");
    assert_eq!(session.control.upgrade_state(), UpgradeState::Plain);
}

#[tokio::test]
async fn test_lowercase_trigger_goes_through_validation() {
    let ctx = TestContext::with_tls();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(
        session.client.command("starttls").await,
        "500 Invalid command. Must be 4 characters"
    );
    assert_eq!(
        session.client.command("star tls").await,
        "500 Command not recognized"
    );
}

#[tokio::test]
async fn test_starttls_when_disabled_answers_454() {
    let ctx = TestContext::new();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(
        session.client.command("STARTTLS").await,
        "454 TLS not available due to temporary reason"
    );
    assert_eq!(session.client.command("NOOP").await, "250 OK");
}

#[tokio::test]
async fn test_missing_certificate_answers_454_every_time() {
    let mut config = Config::default();
    config.tls = TlsConfig {
        enabled: true,
        cert_path: fixture_path("missing.crt"),
        key_path: fixture_path("missing.key"),
    };
    let ctx = TestContext::with_config(config);
    let mut session = ctx.connect_and_greet().await;

    for _ in 0..2 {
        assert_eq!(
            session.client.command("STARTTLS").await,
            "454 TLS not available due to temporary reason"
        );
    }
    assert_eq!(session.client.command("NOOP").await, "250 OK");
}

#[tokio::test]
async fn test_second_starttls_after_upgrade_is_refused() {
    let ctx = TestContext::with_tls();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(session.client.command("STARTTLS").await, "220 Ready to start TLS");
    let mut tls = session.client.start_tls().await;

    assert_eq!(tls.command("STARTTLS").await, "503 TLS already active");
    assert_eq!(tls.command("NOOP").await, "250 OK");
    assert_eq!(ctx.state.stats.get_tls_upgrades(), 1);
}

#[tokio::test]
async fn test_pipelined_plaintext_after_starttls_is_discarded() {
    let ctx = TestContext::with_tls();
    let mut session = ctx.connect_and_greet().await;

    session.client.send_raw(b"STARTTLS\r\nNOOP\r\n").await;
    assert_eq!(session.client.recv().await, "220 Ready to start TLS");
    // A plaintext answer to NOOP would break the handshake.
    let mut tls = session.client.start_tls().await;
    assert_eq!(tls.command("NOOP").await, "250 OK");
}

#[tokio::test]
async fn test_failed_handshake_closes_connection() {
    let ctx = TestContext::with_tls();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(session.client.command("STARTTLS").await, "220 Ready to start TLS");

    session.client.send_raw(b"this is not a TLS record\r\n").await;
    // At most a TLS alert comes back; never a reply line.
    let trailing = session.client.read_to_eof().await;
    assert!(!trailing.contains(&b'\n'), "unexpected reply: {trailing:?}");
    tokio::time::timeout(REPLY_TIMEOUT, session.task)
        .await
        .unwrap()
        .unwrap();
    assert!(session.control.is_closed());
}

#[tokio::test]
async fn test_stalled_handshake_times_out_without_reply() {
    let mut config = Config::default();
    config.tls = fixture_tls_config();
    config.read_timeout = Duration::from_millis(200);
    let ctx = TestContext::with_config(config);
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(session.client.command("STARTTLS").await, "220 Ready to start TLS");

    // No 421: there is no plaintext channel left to send it on.
    session.client.expect_closed().await;
    assert_eq!(session.control.upgrade_state(), UpgradeState::Closed);
    session.finished().await;
}

#[tokio::test]
async fn test_close_during_pending_upgrade_closes_raw_connection() {
    let ctx = TestContext::with_tls();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(session.client.command("STARTTLS").await, "220 Ready to start TLS");

    let control = session.control.clone();
    wait_until(|| control.upgrade_state() == UpgradeState::UpgradeRequested).await;

    control.close();
    control.close();
    assert_eq!(control.upgrade_state(), UpgradeState::Closed);
    session.client.expect_closed().await;
    session.finished().await;
    assert!(ctx.state.clients.is_empty());
}

#[tokio::test]
async fn test_close_after_upgrade_shuts_down_tls() {
    let ctx = TestContext::with_tls();
    let mut session = ctx.connect_and_greet().await;
    assert_eq!(session.client.command("STARTTLS").await, "220 Ready to start TLS");
    let mut tls = session.client.start_tls().await;
    assert_eq!(tls.command("NOOP").await, "250 OK");

    session.control.close();
    tls.expect_closed().await;
    tokio::time::timeout(REPLY_TIMEOUT, session.task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_racing_a_live_handshake_never_panics() {
    let ctx = TestContext::with_tls();
    for round in 0..30u32 {
        let session = ctx.connect_and_greet().await;
        let TestSession {
            mut client,
            control,
            task,
        } = session;
        assert_eq!(client.command("STARTTLS").await, "220 Ready to start TLS");

        let handshake = tokio::spawn(async move { client.try_start_tls().await.is_ok() });
        let closers: Vec<_> = (0..2)
            .map(|_| {
                let control = control.clone();
                tokio::spawn(async move {
                    // Vary the interleaving between requested, resolved and adopted.
                    for _ in 0..round % 5 {
                        tokio::task::yield_now().await;
                    }
                    control.close();
                    control.close();
                })
            })
            .collect();

        for closer in closers {
            closer.await.expect("close panicked");
        }
        tokio::time::timeout(REPLY_TIMEOUT, task)
            .await
            .expect("session did not finish in time")
            .expect("session task panicked");
        tokio::time::timeout(REPLY_TIMEOUT, handshake)
            .await
            .expect("client handshake did not finish in time")
            .expect("client handshake panicked");

        assert!(control.is_closed());
        assert_eq!(control.upgrade_state(), UpgradeState::Closed);
    }
    wait_until(|| ctx.state.clients.is_empty()).await;
}
