// src/core/commands/command_trait.rs

//! Defines the trait every command handler implements.

use crate::connection::{Connection, SessionState};
use crate::core::SmtpError;
use crate::core::manager::SmtpManager;
use async_trait::async_trait;

/// The semantics of one SMTP command.
///
/// A handler owns the wire response for the line it is given: it writes every
/// reply line itself through `conn`. Returning an error ends the session; the
/// handler should only do that for transport failures, never for a command the
/// client got wrong.
#[async_trait]
pub trait SmtpCommand: Send + Sync {
    async fn execute(
        &self,
        conn: &mut Connection,
        state: &mut SessionState,
        manager: &dyn SmtpManager,
        line: &str,
    ) -> Result<(), SmtpError>;
}
