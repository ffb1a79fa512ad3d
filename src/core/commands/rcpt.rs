// src/core/commands/rcpt.rs

use super::command_trait::SmtpCommand;
use super::helpers::parse_path;
use crate::connection::{Connection, SessionState};
use crate::core::SmtpError;
use crate::core::manager::SmtpManager;
use crate::core::protocol::reply;
use async_trait::async_trait;

/// `RCPT TO:<forward-path>`: adds a recipient to the open transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rcpt;

#[async_trait]
impl SmtpCommand for Rcpt {
    async fn execute(
        &self,
        conn: &mut Connection,
        state: &mut SessionState,
        manager: &dyn SmtpManager,
        line: &str,
    ) -> Result<(), SmtpError> {
        if state.transaction.sender.is_none() {
            return conn.send("503 MAIL command required").await;
        }
        let recipient = match parse_path(line, "TO:") {
            Some(recipient) if !recipient.is_empty() => recipient,
            _ => {
                return conn
                    .send("501 Required syntax: 'RCPT TO:<email@host>'")
                    .await;
            }
        };
        if let Some(rejection) = manager.check_recipient(&recipient) {
            return conn.send(rejection).await;
        }
        state.transaction.recipients.push(recipient);
        conn.send(reply::OK).await
    }
}
