// src/core/commands/rset.rs

use super::command_trait::SmtpCommand;
use crate::connection::{Connection, SessionState};
use crate::core::SmtpError;
use crate::core::manager::SmtpManager;
use crate::core::protocol::reply;
use async_trait::async_trait;

/// `RSET`: aborts the current transaction. The greeting survives.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rset;

#[async_trait]
impl SmtpCommand for Rset {
    async fn execute(
        &self,
        conn: &mut Connection,
        state: &mut SessionState,
        _manager: &dyn SmtpManager,
        _line: &str,
    ) -> Result<(), SmtpError> {
        state.clear_message();
        conn.send(reply::OK).await
    }
}
