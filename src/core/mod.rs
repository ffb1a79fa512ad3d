// src/core/mod.rs

//! The central module containing the protocol logic shared by all sessions.

pub mod commands;
pub mod errors;
pub mod manager;
pub mod metrics;
pub mod protocol;
pub mod state;
pub mod tls;

pub use commands::{Command, CommandRegistry};
pub use errors::SmtpError;
