// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::conn::{Connection, ConnectionInfo};
use super::dispatch::{UpgradeTrigger, upgrade_trigger, validate_line};
use super::guard::ConnectionGuard;
use super::session::SessionState;
use super::transport::LineTransport;
use super::upgrade::{SessionControl, UpgradedStream};
use crate::core::metrics;
use crate::core::protocol::reply;
use crate::core::state::{ClientInfo, ServerState};
use crate::core::SmtpError;
use crate::server::AnyStream;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Where the session loop is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Greeting,
    Serving,
    Quitting,
    Closed,
}

/// The next step for the connection's main loop to take.
enum NextAction {
    Continue,
    Quit,
    ExitLoop,
}

/// Manages the full lifecycle of a client connection.
pub struct ConnectionHandler {
    conn: Connection,
    session: SessionState,
    state: Arc<ServerState>,
    control: SessionControl,
    /// The line being processed; discarded when the transport is replaced.
    current_line: Option<String>,
    phase: SessionPhase,
    session_id: u64,
}

impl ConnectionHandler {
    /// Creates a new `ConnectionHandler` over a freshly accepted stream.
    pub fn new(
        state: Arc<ServerState>,
        socket: AnyStream,
        info: ConnectionInfo,
        session_id: u64,
    ) -> Self {
        let transport = LineTransport::new(socket, state.read_timeout(), state.max_line_bytes());
        let conn = Connection::new(
            transport,
            info,
            state.identity(),
            state.upgrader.is_enabled(),
        );
        Self {
            conn,
            session: SessionState::new(state.workspace.clone()),
            state,
            control: SessionControl::new(),
            current_line: None,
            phase: SessionPhase::Greeting,
            session_id,
        }
    }

    /// A handle that can close this session from any task.
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Runs the session until the peer quits, disconnects, times out, or the
    /// session is closed from elsewhere.
    pub async fn run(mut self) {
        let addr = self.conn.peer_addr();
        self.state.clients.insert(
            self.session_id,
            (
                ClientInfo {
                    addr,
                    session_id: self.session_id,
                    created: Instant::now(),
                },
                self.control.clone(),
            ),
        );
        let _guard = ConnectionGuard::new(self.state.clone(), self.session_id, addr);

        let greeting = reply::greeting(self.conn.server_identity(), self.conn.local_port());
        if let Err(e) = self.conn.send(greeting).await {
            debug!("Could not greet {}: {}", addr, e);
            self.close().await;
            return;
        }
        self.phase = SessionPhase::Serving;

        let session_id = self.session_id;
        loop {
            let control = self.control.clone();
            let step = tokio::select! {
                // A close from another task wins over a pending read.
                biased;
                _ = control.cancelled() => {
                    debug!("Session {} closed externally.", session_id);
                    break;
                }
                step = self.handle_command() => step,
            };

            match step {
                Ok(NextAction::Continue) => {}
                Ok(NextAction::Quit) => {
                    self.phase = SessionPhase::Quitting;
                    break;
                }
                Ok(NextAction::ExitLoop) => break,
                Err(SmtpError::Timeout) => {
                    info!("Connection from {} timed out.", addr);
                    // Best effort; a detached transport has nothing to write to.
                    let _ = self.conn.send(reply::SHUTTING_DOWN).await;
                    break;
                }
                Err(e) if e.is_normal_disconnect() => {
                    debug!("Connection from {} closed by peer: {}", addr, e);
                    break;
                }
                Err(SmtpError::Handshake(reason)) => {
                    warn!("TLS handshake with {} failed: {}", addr, reason);
                    break;
                }
                Err(e) => {
                    error!("Closing connection from {} after error: {}", addr, e);
                    break;
                }
            }
        }

        self.close().await;
        self.session.clear_message();
    }

    /// Reads one line and acts on it.
    async fn handle_command(&mut self) -> Result<NextAction, SmtpError> {
        let line = match self.conn.receive_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Connection from {} closed by peer.", self.conn.peer_addr());
                return Ok(NextAction::ExitLoop);
            }
            Err(SmtpError::LineTooLong { max, head }) => {
                debug!("Discarded a line over {} bytes from {}.", max, self.conn.peer_addr());
                // An over-long trigger necessarily carries parameters.
                if upgrade_trigger(&head).is_some() {
                    self.conn.send(reply::NO_PARAMETERS_ALLOWED).await?;
                    return Ok(NextAction::Continue);
                }
                metrics::LINES_REJECTED_TOTAL
                    .with_label_values(&["too_long"])
                    .inc();
                self.conn.send(reply::COMMAND_TOO_LONG).await?;
                return Ok(NextAction::Continue);
            }
            Err(e) => return Err(e),
        };
        let line = self.current_line.insert(line).clone();

        if let Some(trigger) = upgrade_trigger(&line) {
            self.handle_start_tls(trigger).await?;
            self.current_line = None;
            return Ok(NextAction::Continue);
        }

        let token = match validate_line(&line) {
            Ok(token) => token,
            Err(rejection) => {
                metrics::LINES_REJECTED_TOTAL
                    .with_label_values(&[rejection.reason()])
                    .inc();
                self.conn.send(rejection.reply()).await?;
                return Ok(NextAction::Continue);
            }
        };

        let registry = self.state.registry.clone();
        let Some(command) = registry.lookup(&token) else {
            debug!("Session {}: unknown command '{}'", self.session_id, token);
            self.conn.send(reply::COMMAND_NOT_RECOGNIZED).await?;
            return Ok(NextAction::Continue);
        };

        debug!("Session {}: dispatching {}", self.session_id, command.token());
        self.state.stats.increment_total_commands();
        metrics::COMMANDS_PROCESSED_TOTAL
            .with_label_values(&[command.token()])
            .inc();
        command
            .handler()
            .execute(
                &mut self.conn,
                &mut self.session,
                self.state.manager.as_ref(),
                &line,
            )
            .await?;
        self.current_line = None;

        if self.conn.is_quitting() {
            Ok(NextAction::Quit)
        } else {
            Ok(NextAction::Continue)
        }
    }

    /// Runs the STARTTLS sub-protocol.
    ///
    /// Recoverable refusals are answered and leave the plaintext transport in
    /// place. Once `220` is sent there is no way back: the caller either gets
    /// `Ok` with the encrypted stream adopted, or an error that ends the session.
    async fn handle_start_tls(&mut self, trigger: UpgradeTrigger) -> Result<(), SmtpError> {
        if trigger == UpgradeTrigger::WithParameters {
            return self.conn.send(reply::NO_PARAMETERS_ALLOWED).await;
        }
        if self.conn.is_secure() {
            metrics::STARTTLS_TOTAL
                .with_label_values(&["already_active"])
                .inc();
            return self.conn.send(reply::STARTTLS_ALREADY_ACTIVE).await;
        }
        let acceptor = match self.state.upgrader.acceptor() {
            Ok(acceptor) => acceptor,
            Err(e) => {
                warn!("STARTTLS from {} refused: {}", self.conn.peer_addr(), e);
                metrics::STARTTLS_TOTAL
                    .with_label_values(&["unavailable"])
                    .inc();
                return self.conn.send(reply::STARTTLS_UNAVAILABLE).await;
            }
        };

        self.conn.send(reply::STARTTLS_READY).await?;
        let raw = self.conn.transport_mut().detach()?;
        self.control.begin_upgrade(raw, acceptor)?;

        let stream = match self
            .control
            .wait_for_handshake(self.state.read_timeout())
            .await
        {
            Ok(stream) => stream,
            Err(SmtpError::Timeout) => {
                metrics::STARTTLS_TOTAL.with_label_values(&["failed"]).inc();
                return Err(SmtpError::Handshake("timed out".into()));
            }
            Err(e) => {
                metrics::STARTTLS_TOTAL.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };
        self.adopt(stream);
        Ok(())
    }

    /// Makes the encrypted stream the active transport and starts the session
    /// over as if the client had just connected.
    fn adopt(&mut self, stream: UpgradedStream) {
        if self
            .conn
            .transport_mut()
            .replace_underlying_transport(AnyStream::Tls(stream))
            .is_some()
        {
            // `detach` already took the plaintext stream; nothing should be left.
            warn!("Replaced a transport that was still attached.");
        }
        self.session.reset();
        self.current_line = None;
        self.conn.reinitialize();
        self.state.stats.increment_tls_upgrades();
        metrics::STARTTLS_TOTAL.with_label_values(&["upgraded"]).inc();
        info!("Connection from {} upgraded to TLS.", self.conn.peer_addr());
    }

    /// Closes the session and the active transport. Safe to call repeatedly.
    async fn close(&mut self) {
        self.control.close();
        self.conn.transport_mut().shutdown().await;
        self.current_line = None;
        self.phase = SessionPhase::Closed;
    }
}
