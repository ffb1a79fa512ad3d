// tests/integration/server_test.rs

//! The TCP accept loop: connection limit and graceful shutdown.

use super::test_helpers::*;
use smtplane::config::Config;
use smtplane::server;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

async fn start_server(config: Config) -> (TestContext, SocketAddr, CancellationToken, tokio::task::JoinHandle<()>) {
    let ctx = TestContext::with_config(config);
    let server_ctx = server::bind(ctx.state.clone()).await.unwrap();
    let addr = server_ctx.listener.local_addr().unwrap();
    let shutdown = server_ctx.shutdown.clone();
    let task = tokio::spawn(server::serve(server_ctx));
    (ctx, addr, shutdown, task)
}

fn ephemeral_config() -> Config {
    let mut config = Config::default();
    config.port = 0;
    config
}

#[tokio::test]
async fn test_tcp_session_greets_with_bound_port() {
    let (_ctx, addr, shutdown, task) = start_server(ephemeral_config()).await;

    let mut client = TestClient::new(TcpStream::connect(addr).await.unwrap());
    assert_eq!(
        client.recv().await,
        format!("220 localhost Service Ready at port {}", addr.port())
    );
    assert_eq!(client.command("NOOP").await, "250 OK");
    assert!(client.command("QUIT").await.starts_with("221 "));
    client.expect_closed().await;

    shutdown.cancel();
    tokio::time::timeout(REPLY_TIMEOUT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_connections_over_limit_are_refused() {
    let mut config = ephemeral_config();
    config.max_clients = 1;
    let (ctx, addr, shutdown, task) = start_server(config).await;

    let mut first = TestClient::new(TcpStream::connect(addr).await.unwrap());
    assert!(first.recv().await.starts_with("220 "));

    let mut second = TestClient::new(TcpStream::connect(addr).await.unwrap());
    assert_eq!(
        second.recv().await,
        "421 localhost Too many connections, try again later"
    );
    second.expect_closed().await;

    // Once the first session ends its slot is free again.
    assert!(first.command("QUIT").await.starts_with("221 "));
    first.expect_closed().await;
    wait_until(|| ctx.state.clients.is_empty()).await;

    // The permit is released just after the session deregisters, so allow a
    // few refusals before the slot shows up.
    let mut greeted = false;
    for _ in 0..50 {
        let mut third = TestClient::new(TcpStream::connect(addr).await.unwrap());
        if third.recv().await.starts_with("220 ") {
            greeted = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(greeted, "the freed slot was never reused");

    shutdown.cancel();
    tokio::time::timeout(REPLY_TIMEOUT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_live_sessions() {
    let (ctx, addr, shutdown, task) = start_server(ephemeral_config()).await;

    let mut clients = Vec::new();
    for _ in 0..3 {
        let mut client = TestClient::new(TcpStream::connect(addr).await.unwrap());
        assert!(client.recv().await.starts_with("220 "));
        clients.push(client);
    }
    wait_until(|| ctx.state.clients.len() == 3).await;
    assert_eq!(ctx.state.stats.get_total_connections(), 3);

    shutdown.cancel();
    for client in &mut clients {
        client.expect_closed().await;
    }
    tokio::time::timeout(REPLY_TIMEOUT, task).await.unwrap().unwrap();
    assert!(ctx.state.clients.is_empty());
}
