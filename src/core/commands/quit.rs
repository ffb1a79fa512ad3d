// src/core/commands/quit.rs

use super::command_trait::SmtpCommand;
use crate::connection::{Connection, SessionState};
use crate::core::SmtpError;
use crate::core::manager::SmtpManager;
use async_trait::async_trait;

/// `QUIT`: says goodbye and asks the session loop to close.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quit;

#[async_trait]
impl SmtpCommand for Quit {
    async fn execute(
        &self,
        conn: &mut Connection,
        _state: &mut SessionState,
        _manager: &dyn SmtpManager,
        _line: &str,
    ) -> Result<(), SmtpError> {
        let reply = format!(
            "221 {} Service closing transmission channel",
            conn.server_identity()
        );
        conn.quit();
        conn.send(reply).await
    }
}
