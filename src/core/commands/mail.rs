// src/core/commands/mail.rs

use super::command_trait::SmtpCommand;
use super::helpers::parse_path;
use crate::connection::{Connection, SessionState};
use crate::core::SmtpError;
use crate::core::manager::SmtpManager;
use crate::core::protocol::reply;
use async_trait::async_trait;

/// `MAIL FROM:<reverse-path>`: opens a transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mail;

#[async_trait]
impl SmtpCommand for Mail {
    async fn execute(
        &self,
        conn: &mut Connection,
        state: &mut SessionState,
        manager: &dyn SmtpManager,
        line: &str,
    ) -> Result<(), SmtpError> {
        if state.transaction.sender.is_some() {
            return conn.send("503 Sender already specified").await;
        }
        let Some(sender) = parse_path(line, "FROM:") else {
            return conn
                .send("501 Required syntax: 'MAIL FROM:<email@host>'")
                .await;
        };
        if let Some(rejection) = manager.check_sender(&sender) {
            return conn.send(rejection).await;
        }
        state.transaction.sender = Some(sender);
        conn.send(reply::OK).await
    }
}
