// src/core/commands/vrfy.rs

use super::command_trait::SmtpCommand;
use super::helpers::{argument, strip_brackets};
use crate::connection::{Connection, SessionState};
use crate::core::SmtpError;
use crate::core::manager::SmtpManager;
use async_trait::async_trait;

/// `VRFY address`: asks the manager whether a mailbox exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vrfy;

#[async_trait]
impl SmtpCommand for Vrfy {
    async fn execute(
        &self,
        conn: &mut Connection,
        _state: &mut SessionState,
        manager: &dyn SmtpManager,
        line: &str,
    ) -> Result<(), SmtpError> {
        let address = strip_brackets(argument(line));
        if address.is_empty() {
            return conn.send("501 Syntax: VRFY address").await;
        }
        if manager.has_mailbox(address) {
            let reply = format!("250 <{address}>");
            conn.send(reply).await
        } else {
            conn.send("252 Cannot VRFY user, but will accept message")
                .await
        }
    }
}
