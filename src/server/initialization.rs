// src/server/initialization.rs

//! Handles server initialization: shared state, the listener, and the
//! connection limit.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let state = ServerState::initialize(config);
    info!("Server state initialized.");
    setup_with_state(state).await
}

/// Binds the listener for an already assembled `ServerState`.
pub async fn setup_with_state(state: Arc<ServerState>) -> Result<ServerContext> {
    let (host, port) = (state.config.host.clone(), state.config.port);
    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    info!(
        "smtplane listening on {}:{} as '{}'",
        host,
        port,
        state.identity()
    );
    let connection_permits = Arc::new(Semaphore::new(state.config.max_clients));

    Ok(ServerContext {
        state,
        listener,
        shutdown: CancellationToken::new(),
        background_tasks: JoinSet::new(),
        connection_permits,
    })
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Accepting up to {} concurrent clients; read timeout {:?}.",
        config.max_clients, config.read_timeout
    );
    match config.max_message_bytes {
        0 => warn!("WARNING: No 'max_message_bytes' limit is active. Message size is unbounded."),
        limit => info!(
            "Message size limit set to {} bytes ({:.2} MB).",
            limit,
            limit as f64 / 1024.0 / 1024.0
        ),
    }
}
