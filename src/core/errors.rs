// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within a session.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug, Clone)]
pub enum SmtpError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// No complete line arrived within the configured read timeout.
    #[error("Read timed out")]
    Timeout,

    /// The peer dropped the connection without a graceful close.
    #[error("Connection reset by peer")]
    ConnectionReset,

    /// A single line exceeded the hard byte cap of the line codec. `head` holds
    /// its first few bytes.
    #[error("Line exceeds the maximum of {max} bytes")]
    LineTooLong { max: usize, head: String },

    /// I/O was attempted while the plaintext stream is handed to a TLS handshake.
    #[error("Transport is detached for a TLS handshake")]
    Detached,

    /// The session has been closed and the transport released.
    #[error("Connection closed")]
    Closed,

    /// A TLS acceptor could not be set up (missing or unreadable certificates).
    #[error("TLS unavailable: {0}")]
    UpgradeUnavailable(String),

    /// The TLS handshake itself failed.
    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("Message delivery failed: {0}")]
    Delivery(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl SmtpError {
    /// True for failures that end the connection without being worth a warning.
    pub fn is_normal_disconnect(&self) -> bool {
        match self {
            SmtpError::ConnectionReset | SmtpError::Closed => true,
            SmtpError::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

impl PartialEq for SmtpError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SmtpError::Io(e1), SmtpError::Io(e2)) => e1.to_string() == e2.to_string(),
            (
                SmtpError::LineTooLong { max: a, head: h1 },
                SmtpError::LineTooLong { max: b, head: h2 },
            ) => a == b && h1 == h2,
            (SmtpError::UpgradeUnavailable(s1), SmtpError::UpgradeUnavailable(s2)) => s1 == s2,
            (SmtpError::Handshake(s1), SmtpError::Handshake(s2)) => s1 == s2,
            (SmtpError::Delivery(s1), SmtpError::Delivery(s2)) => s1 == s2,
            (SmtpError::Internal(s1), SmtpError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for SmtpError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionAborted => SmtpError::ConnectionReset,
            std::io::ErrorKind::TimedOut => SmtpError::Timeout,
            _ => SmtpError::Io(Arc::new(e)),
        }
    }
}

impl From<tokio::time::error::Elapsed> for SmtpError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        SmtpError::Timeout
    }
}

impl From<tokio_rustls::rustls::Error> for SmtpError {
    fn from(e: tokio_rustls::rustls::Error) -> Self {
        SmtpError::UpgradeUnavailable(e.to_string())
    }
}
