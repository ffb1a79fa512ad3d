// src/server/context.rs

use crate::core::state::ServerState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub state: Arc<ServerState>,
    pub listener: TcpListener,
    /// Cancelled once to stop the accept loop and every background task.
    pub shutdown: CancellationToken,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
    /// One permit per live session, `max_clients` in total.
    pub connection_permits: Arc<Semaphore>,
}
