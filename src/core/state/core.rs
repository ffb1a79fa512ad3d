// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide state.

use super::client::ClientMap;
use super::stats::StatsState;
use super::workspace::Workspace;
use crate::config::Config;
use crate::core::commands::CommandRegistry;
use crate::core::manager::{InMemoryManager, SmtpManager};
use crate::core::tls::{DisabledTls, PemTlsUpgrader, TlsUpgrader};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The central struct holding all shared, server-wide state.
///
/// It is wrapped in an `Arc` and handed to every connection handler. Everything
/// in it is read-only once sessions start, except the client map and counters.
pub struct ServerState {
    /// The server's configuration, fixed at startup.
    pub config: Config,
    /// The token-to-handler table shared by all sessions.
    pub registry: Arc<CommandRegistry>,
    /// The business-logic collaborator handed to every command handler.
    pub manager: Arc<dyn SmtpManager>,
    /// Limits for buffered message data.
    pub workspace: Arc<Workspace>,
    /// Supplies TLS acceptors for STARTTLS.
    pub upgrader: Arc<dyn TlsUpgrader>,
    /// A map of all active client connections, keyed by a unique session ID.
    pub clients: ClientMap,
    pub stats: StatsState,
}

impl ServerState {
    /// Assembles the state from explicit collaborators.
    pub fn new(
        config: Config,
        registry: Arc<CommandRegistry>,
        manager: Arc<dyn SmtpManager>,
        upgrader: Arc<dyn TlsUpgrader>,
    ) -> Self {
        let workspace = Arc::new(Workspace::from_config(&config));
        Self {
            config,
            registry,
            manager,
            workspace,
            upgrader,
            clients: Default::default(),
            stats: StatsState::new(),
        }
    }

    /// Builds the state the server binary runs with: the standard command set,
    /// the in-memory manager, and PEM-backed TLS when enabled.
    pub fn initialize(config: Config) -> Arc<Self> {
        let upgrader: Arc<dyn TlsUpgrader> = if config.tls.enabled {
            info!(
                "STARTTLS enabled with certificate '{}'.",
                config.tls.cert_path
            );
            Arc::new(PemTlsUpgrader::new(&config.tls))
        } else {
            info!("STARTTLS disabled.");
            Arc::new(DisabledTls)
        };
        Arc::new(Self::new(
            config,
            Arc::new(CommandRegistry::standard()),
            Arc::new(InMemoryManager::new()),
            upgrader,
        ))
    }

    pub fn identity(&self) -> &str {
        &self.config.identity
    }

    pub fn read_timeout(&self) -> Duration {
        self.config.read_timeout
    }

    pub fn max_line_bytes(&self) -> usize {
        self.config.max_line_bytes
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("workspace", &self.workspace)
            .field("clients", &self.clients.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
