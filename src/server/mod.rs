// src/server/mod.rs

//! The TCP front end: binds the listener, runs background tasks, and spawns
//! one session task per accepted connection.

use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod stream;

pub use context::ServerContext;
pub use stream::{AnyStream, BoxedIo, Io};

/// The main server startup function, orchestrating all setup phases.
///
/// Returns once SIGINT or SIGTERM was received and every session is closed.
pub async fn run(config: Config) -> Result<()> {
    let mut ctx = initialization::setup(config).await?;
    spawn_background_tasks(&mut ctx);
    connection_loop::run(ctx).await;
    Ok(())
}

/// Binds a listener for `state` without starting anything.
///
/// Together with [`serve`] this lets embedders and tests supply their own
/// collaborators and control shutdown through `ServerContext::shutdown`.
pub async fn bind(state: Arc<ServerState>) -> Result<ServerContext> {
    initialization::setup_with_state(state).await
}

/// Runs the accept loop until `ctx.shutdown` is cancelled.
pub async fn serve(ctx: ServerContext) {
    connection_loop::run(ctx).await;
}

fn spawn_background_tasks(ctx: &mut ServerContext) {
    let shutdown = ctx.shutdown.clone();
    ctx.background_tasks
        .spawn(connection_loop::watch_signals(shutdown));

    if ctx.state.config.metrics.enabled {
        let state = ctx.state.clone();
        let shutdown = ctx.shutdown.clone();
        ctx.background_tasks
            .spawn(metrics_server::run_metrics_server(state, shutdown));
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }
}
