// src/core/tls.rs

//! Supplies the server-side TLS acceptor used when a session asks for STARTTLS.

use crate::config::TlsConfig;
use crate::core::SmtpError;
use once_cell::sync::OnceCell;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls;
use tracing::{info, warn};

/// Creates the handshake-capable side of a STARTTLS upgrade.
///
/// `acceptor` is called once per upgrade attempt, before `220 Ready to start
/// TLS` is sent. An error means the upgrade cannot be set up right now; the
/// session answers `454` and stays in plaintext.
pub trait TlsUpgrader: Send + Sync {
    fn acceptor(&self) -> Result<TlsAcceptor, SmtpError>;

    /// True if EHLO should advertise STARTTLS.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// The upgrader used when TLS is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTls;

impl TlsUpgrader for DisabledTls {
    fn acceptor(&self) -> Result<TlsAcceptor, SmtpError> {
        Err(SmtpError::UpgradeUnavailable("TLS is not configured".into()))
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// An upgrader around an already-built rustls server configuration.
#[derive(Clone)]
pub struct StaticTlsUpgrader {
    acceptor: TlsAcceptor,
}

impl StaticTlsUpgrader {
    pub fn new(config: Arc<rustls::ServerConfig>) -> Self {
        Self {
            acceptor: TlsAcceptor::from(config),
        }
    }
}

impl TlsUpgrader for StaticTlsUpgrader {
    fn acceptor(&self) -> Result<TlsAcceptor, SmtpError> {
        Ok(self.acceptor.clone())
    }
}

/// Loads the certificate chain and key from PEM files on first use.
///
/// A failed load is not cached, so fixing the files on disk makes the next
/// STARTTLS succeed without a restart.
pub struct PemTlsUpgrader {
    cert_path: String,
    key_path: String,
    acceptor: OnceCell<TlsAcceptor>,
}

impl PemTlsUpgrader {
    pub fn new(config: &TlsConfig) -> Self {
        Self {
            cert_path: config.cert_path.clone(),
            key_path: config.key_path.clone(),
            acceptor: OnceCell::new(),
        }
    }

    fn load(&self) -> Result<TlsAcceptor, SmtpError> {
        let certs = load_certs(&self.cert_path)?;
        let key = load_key(&self.key_path)?;
        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        info!("Loaded TLS certificate from '{}'.", self.cert_path);
        Ok(TlsAcceptor::from(Arc::new(server_config)))
    }
}

impl TlsUpgrader for PemTlsUpgrader {
    fn acceptor(&self) -> Result<TlsAcceptor, SmtpError> {
        self.acceptor
            .get_or_try_init(|| self.load())
            .cloned()
            .inspect_err(|e| warn!("Cannot set up STARTTLS: {}", e))
    }
}

/// Loads TLS certificates from a PEM file.
pub fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>, SmtpError> {
    let cert_file = File::open(path).map_err(|e| {
        SmtpError::UpgradeUnavailable(format!(
            "Failed to open certificate file '{path}': {e}"
        ))
    })?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            SmtpError::UpgradeUnavailable(format!("Invalid certificate file '{path}': {e}"))
        })?;
    if certs.is_empty() {
        return Err(SmtpError::UpgradeUnavailable(format!(
            "No certificates found in '{path}'"
        )));
    }
    Ok(certs)
}

/// Loads a private key from a PEM file.
pub fn load_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>, SmtpError> {
    let key_file = File::open(path).map_err(|e| {
        SmtpError::UpgradeUnavailable(format!(
            "Failed to open private key file '{path}': {e}"
        ))
    })?;
    let mut key_reader = BufReader::new(key_file);
    rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| SmtpError::UpgradeUnavailable(format!("Invalid key file '{path}': {e}")))?
        .ok_or_else(|| {
            SmtpError::UpgradeUnavailable(format!("No private key found in key file '{path}'"))
        })
}
