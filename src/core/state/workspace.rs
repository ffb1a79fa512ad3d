// src/core/state/workspace.rs

use crate::config::Config;

/// Shared limits for the message data buffered by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// The largest message `DATA` will accept, in bytes. `0` means unlimited.
    pub max_message_bytes: usize,
}

impl Workspace {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_message_bytes: config.max_message_bytes,
        }
    }

    /// True if a message of `size` bytes is within the configured limit.
    pub fn accepts(&self, size: usize) -> bool {
        self.max_message_bytes == 0 || size <= self.max_message_bytes
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
