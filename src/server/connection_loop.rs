// src/server/connection_loop.rs

//! Contains the main server loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use super::stream::AnyStream;
use crate::connection::{ConnectionHandler, ConnectionInfo};
use crate::core::metrics;
use crate::core::protocol::reply;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// How long live sessions get to wind down after shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Cancels `shutdown` on SIGINT or SIGTERM.
pub async fn watch_signals(shutdown: CancellationToken) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
        _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        _ = shutdown.cancelled() => return Ok(()),
    }
    shutdown.cancel();
    Ok(())
}

/// The main server loop that accepts connections until `ctx.shutdown` is
/// cancelled, then closes every live session.
pub async fn run(mut ctx: ServerContext) {
    let mut session_id_counter: u64 = 0;
    let mut client_tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = ctx.shutdown.cancelled() => break,

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => debug!("A background task finished."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        session_id_counter = session_id_counter.wrapping_add(1);
                        accept_connection(&ctx, &mut client_tasks, socket, addr, session_id_counter);
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A client handler panicked: {e:?}");
                }
            },
        }
    }

    ctx.shutdown.cancel();
    let controls: Vec<_> = ctx
        .state
        .clients
        .iter()
        .map(|entry| entry.value().1.clone())
        .collect();
    info!("Shutting down. Closing {} live sessions.", controls.len());
    for control in controls {
        control.close();
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for sessions to close; aborting the rest.");
        client_tasks.shutdown().await;
    }
    info!("All client connections closed.");

    if tokio::time::timeout(SHUTDOWN_GRACE, async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    };
    info!("Server shutdown complete.");
}

/// Starts a session for `socket`, or turns it away if the server is full.
fn accept_connection(
    ctx: &ServerContext,
    client_tasks: &mut JoinSet<()>,
    mut socket: TcpStream,
    addr: SocketAddr,
    session_id: u64,
) {
    ctx.state.stats.increment_total_connections();
    metrics::CONNECTIONS_RECEIVED_TOTAL.inc();

    let Ok(permit) = ctx.connection_permits.clone().try_acquire_owned() else {
        warn!("Refusing connection from {}: max_clients reached.", addr);
        metrics::CONNECTIONS_REJECTED_TOTAL.inc();
        let refusal = format!("{}\r\n", reply::too_many_connections(ctx.state.identity()));
        client_tasks.spawn(async move {
            let _ = socket.write_all(refusal.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        return;
    };

    info!("Accepted new connection from: {}", addr);
    if let Err(e) = socket.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }
    let local_port = socket
        .local_addr()
        .map(|local| local.port())
        .unwrap_or(ctx.state.config.port);
    let info = ConnectionInfo {
        peer_addr: addr,
        local_port,
    };
    let handler =
        ConnectionHandler::new(ctx.state.clone(), AnyStream::plain(socket), info, session_id);
    client_tasks.spawn(
        async move {
            handler.run().await;
            drop(permit);
        }
        .instrument(info_span!("session", id = session_id, peer = %addr)),
    );
}
