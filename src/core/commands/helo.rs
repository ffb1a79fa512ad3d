// src/core/commands/helo.rs

use super::command_trait::SmtpCommand;
use super::helpers::argument;
use crate::connection::{Connection, SessionState};
use crate::core::SmtpError;
use crate::core::manager::SmtpManager;
use async_trait::async_trait;

/// `HELO domain`: plain SMTP greeting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Helo;

#[async_trait]
impl SmtpCommand for Helo {
    async fn execute(
        &self,
        conn: &mut Connection,
        state: &mut SessionState,
        _manager: &dyn SmtpManager,
        line: &str,
    ) -> Result<(), SmtpError> {
        let domain = argument(line);
        if domain.is_empty() {
            return conn.send("501 Syntax: HELO hostname").await;
        }
        state.clear_message();
        state.client_domain = Some(domain.to_string());
        state.is_esmtp = false;
        let reply = format!("250 {}", conn.server_identity());
        conn.send(reply).await
    }
}
