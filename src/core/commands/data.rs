// src/core/commands/data.rs

use super::command_trait::SmtpCommand;
use super::helpers::argument;
use crate::connection::{Connection, SessionState};
use crate::core::SmtpError;
use crate::core::manager::SmtpManager;
use crate::core::protocol::reply;
use async_trait::async_trait;
use tracing::{debug, warn};

/// `DATA`: reads the message body up to the lone `.` line and hands the
/// finished message to the manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct Data;

#[async_trait]
impl SmtpCommand for Data {
    async fn execute(
        &self,
        conn: &mut Connection,
        state: &mut SessionState,
        manager: &dyn SmtpManager,
        line: &str,
    ) -> Result<(), SmtpError> {
        if !argument(line).is_empty() {
            return conn.send(reply::NO_PARAMETERS_ALLOWED).await;
        }
        if state.transaction.recipients.is_empty() {
            return conn.send("503 RCPT command(s) missing").await;
        }
        conn.send("354 Start mail input; end with <CRLF>.<CRLF>")
            .await?;

        let mut oversized = false;
        loop {
            let line = match conn.receive_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("Peer {} closed the stream during DATA.", conn.peer_addr());
                    state.clear_message();
                    return Ok(());
                }
                Err(SmtpError::LineTooLong { .. }) => {
                    oversized = true;
                    continue;
                }
                Err(e) => {
                    state.clear_message();
                    return Err(e);
                }
            };
            if line == "." {
                break;
            }
            if oversized {
                continue;
            }
            // Undo dot-stuffing (RFC 5321 §4.5.2).
            let content = line.strip_prefix('.').unwrap_or(&line);
            let size = state.transaction.data.len() + content.len() + 2;
            if !state.workspace().accepts(size) {
                oversized = true;
                continue;
            }
            let data = &mut state.transaction.data;
            data.extend_from_slice(content.as_bytes());
            data.extend_from_slice(b"\r\n");
        }

        if oversized {
            state.clear_message();
            return conn.send("552 Message size exceeds fixed limit").await;
        }

        let Some(message) = state.take_message() else {
            return conn.send("503 RCPT command(s) missing").await;
        };
        match manager.deliver(&message) {
            Ok(()) => conn.send(reply::OK).await,
            Err(e) => {
                warn!("Delivery of message from <{}> failed: {}", message.sender, e);
                conn.send("451 Requested action aborted: local error in processing")
                    .await
            }
        }
    }
}
