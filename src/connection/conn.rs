// src/connection/conn.rs

//! Defines `Connection`, the handle command handlers use to talk to the peer.

use super::transport::LineTransport;
use crate::core::SmtpError;
use std::net::SocketAddr;
use tracing::debug;

/// Where a connection came from, as known by the accept point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// The network address of the client.
    pub peer_addr: SocketAddr,
    /// The local port the client connected to, announced in the greeting.
    pub local_port: u16,
}

/// One client connection: its active transport plus the per-connection
/// context handlers need to format replies.
pub struct Connection {
    transport: LineTransport,
    info: ConnectionInfo,
    identity: String,
    /// True if STARTTLS can be offered on this server at all.
    tls_offered: bool,
    quitting: bool,
}

impl Connection {
    pub fn new(
        transport: LineTransport,
        info: ConnectionInfo,
        identity: impl Into<String>,
        tls_offered: bool,
    ) -> Self {
        Self {
            transport,
            info,
            identity: identity.into(),
            tls_offered,
            quitting: false,
        }
    }

    /// Sends one reply line to the client.
    pub async fn send(&mut self, line: impl AsRef<str>) -> Result<(), SmtpError> {
        let line = line.as_ref();
        debug!("{} <- {}", self.info.peer_addr, line);
        self.transport.send_line(line).await
    }

    /// Reads one line from the client. `Ok(None)` means end of stream.
    pub async fn receive_line(&mut self) -> Result<Option<String>, SmtpError> {
        let line = self.transport.receive_line().await?;
        if let Some(line) = &line {
            debug!("{} -> {}", self.info.peer_addr, line);
        }
        Ok(line)
    }

    /// Asks the session loop to close the connection after the current command.
    pub fn quit(&mut self) {
        self.quitting = true;
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    pub fn server_identity(&self) -> &str {
        &self.identity
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.info.peer_addr
    }

    pub fn local_port(&self) -> u16 {
        self.info.local_port
    }

    pub fn is_secure(&self) -> bool {
        self.transport.is_secure()
    }

    /// True if EHLO should advertise STARTTLS right now.
    pub fn can_start_tls(&self) -> bool {
        self.tls_offered && !self.transport.is_secure()
    }

    pub(crate) fn transport_mut(&mut self) -> &mut LineTransport {
        &mut self.transport
    }

    /// Re-establishes the per-connection context after the transport changed.
    pub(crate) fn reinitialize(&mut self) {
        self.quitting = false;
    }
}
