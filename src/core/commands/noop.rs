// src/core/commands/noop.rs

use super::command_trait::SmtpCommand;
use crate::connection::{Connection, SessionState};
use crate::core::SmtpError;
use crate::core::manager::SmtpManager;
use crate::core::protocol::reply;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

#[async_trait]
impl SmtpCommand for Noop {
    async fn execute(
        &self,
        conn: &mut Connection,
        _state: &mut SessionState,
        _manager: &dyn SmtpManager,
        _line: &str,
    ) -> Result<(), SmtpError> {
        conn.send(reply::OK).await
    }
}
