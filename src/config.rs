// src/config.rs

//! Manages server configuration: loading from TOML, defaults, and validation.

use crate::core::protocol::reply::MAX_COMMAND_LINE_CHARS;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// Smallest accepted `max_line_bytes`: a command line of the maximum length
/// must fit even when every character takes four bytes in UTF-8.
pub const MIN_MAX_LINE_BYTES: usize = 4 * MAX_COMMAND_LINE_CHARS;

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9425
}

/// Configuration for STARTTLS.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TlsConfig {
    /// If true, STARTTLS is advertised and accepted.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cert_path")]
    pub cert_path: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cert_path: default_cert_path(),
            key_path: default_key_path(),
        }
    }
}

fn default_cert_path() -> String {
    "smtplane.crt".to_string()
}
fn default_key_path() -> String {
    "smtplane.key".to_string()
}

/// The configuration as written in the file, before validation.
#[derive(Deserialize, Debug)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_identity")]
    identity: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    read_timeout: Duration,
    #[serde(default = "default_max_line_bytes")]
    max_line_bytes: usize,
    #[serde(default = "default_max_message_bytes")]
    max_message_bytes: usize,
    #[serde(default)]
    tls: TlsConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    2525
}
fn default_identity() -> String {
    "localhost".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    1024
}
fn default_read_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}
fn default_max_line_bytes() -> usize {
    64 * 1024
}
fn default_max_message_bytes() -> usize {
    10 * 1024 * 1024 // 10 MiB
}

/// Represents the final, validated server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// The name the server announces in its greeting and replies.
    pub identity: String,
    pub log_level: String,
    pub max_clients: usize,
    /// How long a single read may wait before the session times out.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Hard cap on one line as read from the wire, terminator excluded.
    pub max_line_bytes: usize,
    /// Largest message `DATA` will accept. `0` disables the limit.
    pub max_message_bytes: usize,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            identity: default_identity(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            read_timeout: default_read_timeout(),
            max_line_bytes: default_max_line_bytes(),
            max_message_bytes: default_max_message_bytes(),
            tls: TlsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            host: raw.host,
            port: raw.port,
            identity: raw.identity,
            log_level: raw.log_level,
            max_clients: raw.max_clients,
            read_timeout: raw.read_timeout,
            max_line_bytes: raw.max_line_bytes,
            max_message_bytes: raw.max_message_bytes,
            tls: raw.tls,
            metrics: raw.metrics,
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).context("Failed to parse TOML")?;
        let config = Config::from(raw);
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.identity.trim().is_empty() {
            return Err(anyhow!("identity cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.read_timeout.is_zero() {
            return Err(anyhow!("read_timeout cannot be 0"));
        }
        if self.max_line_bytes < MIN_MAX_LINE_BYTES {
            return Err(anyhow!(
                "max_line_bytes must be at least {MIN_MAX_LINE_BYTES} \
                 ({MAX_COMMAND_LINE_CHARS} characters of up to 4 bytes each)"
            ));
        }
        if self.max_message_bytes > 0 && self.max_message_bytes < self.max_line_bytes {
            warn!(
                "max_message_bytes ({}) is smaller than max_line_bytes ({}).",
                self.max_message_bytes, self.max_line_bytes
            );
        }

        if self.tls.enabled {
            if self.tls.cert_path.trim().is_empty() {
                return Err(anyhow!("tls.cert_path cannot be empty when TLS is enabled"));
            }
            if self.tls.key_path.trim().is_empty() {
                return Err(anyhow!("tls.key_path cannot be empty when TLS is enabled"));
            }
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }
}
