// src/core/protocol/reply.rs

//! Fixed reply lines written by the session engine itself.
//!
//! Command handlers format their own replies; the constants here cover only
//! what the session loop says on its own behalf.

/// The literal token that triggers the in-band TLS upgrade.
pub const STARTTLS: &str = "STARTTLS";

/// The longest command line accepted by the dispatcher, in characters.
pub const MAX_COMMAND_LINE_CHARS: usize = 1000;

pub const COMMAND_NOT_RECOGNIZED: &str = "500 Command not recognized";
pub const INVALID_COMMAND: &str = "500 Invalid command. Must be 4 characters";
pub const COMMAND_TOO_LONG: &str = "500 Command too long. 1000 character maximum.";

pub const NO_PARAMETERS_ALLOWED: &str = "501 Syntax error (no parameters allowed)";
pub const STARTTLS_READY: &str = "220 Ready to start TLS";
pub const STARTTLS_UNAVAILABLE: &str = "454 TLS not available due to temporary reason";
pub const STARTTLS_ALREADY_ACTIVE: &str = "503 TLS already active";

pub const SHUTTING_DOWN: &str = "421 Service shutting down and closing transmission channel";

pub const OK: &str = "250 OK";

/// The banner sent when a session starts.
pub fn greeting(identity: &str, port: u16) -> String {
    format!("220 {identity} Service Ready at port {port}")
}

/// The reply sent to a connection refused because the server is full.
pub fn too_many_connections(identity: &str) -> String {
    format!("421 {identity} Too many connections, try again later")
}
