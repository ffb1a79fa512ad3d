// src/connection/transport.rs

//! Defines `LineTransport`, the line-oriented view over whichever stream
//! (plaintext or TLS) is currently active for a connection.

use crate::core::SmtpError;
use crate::core::protocol::{LineCodec, LineFrame};
use crate::server::{AnyStream, BoxedIo};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{Framed, FramedParts};
use tracing::{debug, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Line-delimited I/O over exactly one active stream.
///
/// The framed stream is `None` while the plaintext stream is detached for a
/// TLS handshake and after shutdown; every I/O call in that window fails with
/// `SmtpError::Detached`.
pub struct LineTransport {
    framed: Option<Framed<AnyStream, LineCodec>>,
    read_timeout: Duration,
    max_line_bytes: usize,
}

impl LineTransport {
    pub fn new(stream: AnyStream, read_timeout: Duration, max_line_bytes: usize) -> Self {
        Self {
            framed: Some(Framed::new(
                stream,
                LineCodec::with_max_length(max_line_bytes),
            )),
            read_timeout,
            max_line_bytes,
        }
    }

    /// Writes `text` followed by CRLF and flushes it.
    pub async fn send_line(&mut self, text: &str) -> Result<(), SmtpError> {
        let framed = self.framed.as_mut().ok_or(SmtpError::Detached)?;
        framed.send(text).await
    }

    /// Waits for the next line, up to the read timeout.
    ///
    /// Returns `Ok(None)` when the peer closed the stream gracefully.
    pub async fn receive_line(&mut self) -> Result<Option<String>, SmtpError> {
        let read_timeout = self.read_timeout;
        let framed = self.framed.as_mut().ok_or(SmtpError::Detached)?;
        match tokio::time::timeout(read_timeout, framed.next()).await? {
            Some(Ok(LineFrame::Line(line))) => Ok(Some(line)),
            Some(Ok(LineFrame::Overflow { head })) => Err(SmtpError::LineTooLong {
                max: self.max_line_bytes,
                head,
            }),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Swaps the stream used for all subsequent reads and writes.
    ///
    /// Bytes buffered but not yet consumed from the old stream are carried over
    /// to the new one. Returns the previous stream, or `None` if the transport
    /// was detached.
    pub fn replace_underlying_transport(&mut self, stream: AnyStream) -> Option<AnyStream> {
        match self.framed.take() {
            Some(old) => {
                let old_parts = old.into_parts();
                let mut parts = FramedParts::new::<&str>(stream, old_parts.codec);
                parts.read_buf = old_parts.read_buf;
                parts.write_buf = old_parts.write_buf;
                self.framed = Some(Framed::from_parts(parts));
                Some(old_parts.io)
            }
            None => {
                self.framed = Some(Framed::new(
                    stream,
                    LineCodec::with_max_length(self.max_line_bytes),
                ));
                None
            }
        }
    }

    /// Takes the plaintext stream out so a TLS handshake can own it.
    ///
    /// Anything the peer sent after the upgrade trigger is still sitting in the
    /// read buffer; it is dropped here so no plaintext crosses the TLS boundary.
    pub fn detach(&mut self) -> Result<BoxedIo, SmtpError> {
        if self.is_secure() {
            return Err(SmtpError::Internal(
                "cannot detach a stream that is already encrypted".into(),
            ));
        }
        let framed = self.framed.take().ok_or(SmtpError::Detached)?;
        let parts = framed.into_parts();
        if !parts.read_buf.is_empty() {
            warn!(
                "Discarding {} bytes pipelined after STARTTLS.",
                parts.read_buf.len()
            );
        }
        match parts.io {
            AnyStream::Plain(io) => Ok(io),
            AnyStream::Tls(_) => Err(SmtpError::Internal(
                "stream became encrypted while detaching".into(),
            )),
        }
    }

    /// Best-effort shutdown of the active stream. Errors are swallowed.
    pub async fn shutdown(&mut self) {
        let Some(mut framed) = self.framed.take() else {
            return;
        };
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, framed.get_mut().shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Ignoring error while shutting down transport: {}", e),
            Err(_) => debug!("Transport shutdown timed out; dropping the stream."),
        }
    }

    pub fn is_detached(&self) -> bool {
        self.framed.is_none()
    }

    pub fn is_secure(&self) -> bool {
        self.framed
            .as_ref()
            .is_some_and(|framed| framed.get_ref().is_tls())
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}
