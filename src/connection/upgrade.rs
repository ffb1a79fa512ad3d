// src/connection/upgrade.rs

//! The STARTTLS state machine shared between a session loop, the task running
//! its TLS handshake, and anyone who may close the session.
//!
//! The handshake finishes on its own task, possibly while the loop is parked.
//! Depositing its result and closing the session both go through one mutex,
//! so whichever happens first decides the outcome and the other becomes a
//! no-op. The loop is the only party that ever adopts the encrypted stream.

use crate::core::SmtpError;
use crate::server::BoxedIo;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// An encrypted stream ready to be adopted by the session loop.
pub type UpgradedStream = Box<TlsStream<BoxedIo>>;

/// Where the session stands with respect to the transport upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeState {
    /// No upgrade pending; the loop owns the active transport.
    Plain,
    /// `220 Ready to start TLS` was sent and the handshake is running.
    UpgradeRequested,
    /// The handshake finished and its result waits to be adopted.
    HandshakeResolved,
    /// The session is closed.
    Closed,
}

enum Phase {
    Plain,
    /// The handshake task owns the raw stream; aborting it closes the stream.
    UpgradeRequested {
        handshake: JoinHandle<()>,
    },
    HandshakeResolved(Result<UpgradedStream, SmtpError>),
    Closed,
}

struct ControlInner {
    phase: Mutex<Phase>,
    /// Signals the loop that a handshake result was deposited.
    resolved: Notify,
    /// Wakes the loop out of any read when the session is closed.
    cancel: CancellationToken,
}

/// A cloneable, thread-safe handle on one session's lifecycle.
#[derive(Clone)]
pub struct SessionControl {
    inner: Arc<ControlInner>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ControlInner {
                phase: Mutex::new(Phase::Plain),
                resolved: Notify::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Closes the session. Idempotent and safe to call from any task.
    ///
    /// A pending handshake is unregistered and aborted; the aborted task drops
    /// the raw stream it owns, which closes the connection. Otherwise the loop
    /// wakes up and shuts down its active transport.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.inner.phase.lock(), Phase::Closed);
        match previous {
            Phase::UpgradeRequested { handshake } => {
                debug!("Closing session with a TLS handshake in flight.");
                handshake.abort();
            }
            Phase::HandshakeResolved(result) => drop(result),
            Phase::Plain | Phase::Closed => {}
        }
        self.inner.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Completes when `close` has been called.
    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await
    }

    pub fn upgrade_state(&self) -> UpgradeState {
        match &*self.inner.phase.lock() {
            Phase::Plain => UpgradeState::Plain,
            Phase::UpgradeRequested { .. } => UpgradeState::UpgradeRequested,
            Phase::HandshakeResolved(_) => UpgradeState::HandshakeResolved,
            Phase::Closed => UpgradeState::Closed,
        }
    }

    /// The handshake-completion notification.
    ///
    /// Fires at most once per upgrade, from the handshake task. If the session
    /// is no longer waiting (it was closed first), the result is dropped,
    /// which closes any stream it carries.
    pub fn handshake_completed(&self, result: Result<TlsStream<BoxedIo>, SmtpError>) {
        let stale = {
            let mut phase = self.inner.phase.lock();
            if matches!(*phase, Phase::UpgradeRequested { .. }) {
                *phase = Phase::HandshakeResolved(result.map(Box::new));
                None
            } else {
                Some(result)
            }
        };
        match stale {
            None => self.inner.resolved.notify_one(),
            Some(result) => {
                debug!("Discarding TLS handshake result for a session that is gone.");
                drop(result);
            }
        }
    }

    /// Starts the handshake over `raw` on a separate task and registers for
    /// its completion.
    ///
    /// Fails with `Closed` if the session was closed in the meantime; `raw` is
    /// dropped in that case.
    pub(crate) fn begin_upgrade(&self, raw: BoxedIo, acceptor: TlsAcceptor) -> Result<(), SmtpError> {
        let mut phase = self.inner.phase.lock();
        match *phase {
            Phase::Plain => {}
            Phase::Closed => return Err(SmtpError::Closed),
            _ => {
                return Err(SmtpError::Internal(
                    "a TLS upgrade is already in progress".into(),
                ));
            }
        }
        let control = self.clone();
        // The lock is still held here, so the task cannot report back before
        // its handle is registered.
        let handshake = tokio::spawn(async move {
            let result = acceptor
                .accept(raw)
                .await
                .map_err(|e| SmtpError::Handshake(e.to_string()));
            control.handshake_completed(result);
        });
        *phase = Phase::UpgradeRequested { handshake };
        Ok(())
    }

    /// Waits up to `limit` for the handshake result and consumes it.
    ///
    /// On success the phase is back to `Plain` and the caller owns the
    /// encrypted stream. On timeout the handshake stays registered; the caller
    /// is expected to `close`.
    pub(crate) async fn wait_for_handshake(&self, limit: Duration) -> Result<UpgradedStream, SmtpError> {
        let waiting = async {
            loop {
                if let Some(result) = self.take_resolved() {
                    return result;
                }
                tokio::select! {
                    _ = self.inner.resolved.notified() => {}
                    _ = self.inner.cancel.cancelled() => return Err(SmtpError::Closed),
                }
            }
        };
        tokio::time::timeout(limit, waiting).await?
    }

    fn take_resolved(&self) -> Option<Result<UpgradedStream, SmtpError>> {
        let mut phase = self.inner.phase.lock();
        if !matches!(*phase, Phase::HandshakeResolved(_)) {
            return None;
        }
        match std::mem::replace(&mut *phase, Phase::Plain) {
            Phase::HandshakeResolved(result) => Some(result),
            _ => None,
        }
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionControl")
            .field("state", &self.upgrade_state())
            .finish()
    }
}
