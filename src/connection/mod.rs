// src/connection/mod.rs

//! Manages the lifecycle of a single client connection: line transport,
//! validation and dispatch, the STARTTLS upgrade, and teardown.

mod conn;
mod dispatch;
mod guard;
mod handler;
mod session;
mod transport;
mod upgrade;

pub use conn::{Connection, ConnectionInfo};
pub use dispatch::{LineRejection, UpgradeTrigger, upgrade_trigger, validate_line};
pub use guard::ConnectionGuard;
pub use handler::{ConnectionHandler, SessionPhase};
pub use session::{MailMessage, SessionState, Transaction};
pub use transport::LineTransport;
pub use upgrade::{SessionControl, UpgradeState, UpgradedStream};
