// src/core/commands/ehlo.rs

use super::command_trait::SmtpCommand;
use super::helpers::argument;
use crate::connection::{Connection, SessionState};
use crate::core::SmtpError;
use crate::core::manager::SmtpManager;
use async_trait::async_trait;

/// `EHLO domain`: extended greeting, answered with the extension list.
///
/// STARTTLS is only advertised while the connection is still in plaintext.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ehlo;

#[async_trait]
impl SmtpCommand for Ehlo {
    async fn execute(
        &self,
        conn: &mut Connection,
        state: &mut SessionState,
        _manager: &dyn SmtpManager,
        line: &str,
    ) -> Result<(), SmtpError> {
        let domain = argument(line);
        if domain.is_empty() {
            return conn.send("501 Syntax: EHLO hostname").await;
        }
        state.clear_message();
        state.client_domain = Some(domain.to_string());
        state.is_esmtp = true;

        let mut lines = vec![
            format!("250-{}", conn.server_identity()),
            "250-8BITMIME".to_string(),
        ];
        if conn.can_start_tls() {
            lines.push("250-STARTTLS".to_string());
        }
        lines.push(format!("250 SIZE {}", state.workspace().max_message_bytes));
        for reply in lines {
            conn.send(reply).await?;
        }
        Ok(())
    }
}
