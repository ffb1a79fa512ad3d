// src/core/manager.rs

//! The business-logic collaborator behind the command handlers.
//!
//! The session loop never looks inside a manager; it only passes it through to
//! handlers, which use it to vet addresses and hand off accepted messages.

use crate::connection::MailMessage;
use crate::core::SmtpError;
use crate::core::metrics;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

pub trait SmtpManager: Send + Sync {
    /// Vets a reverse path. `Some(reply)` rejects it with that reply line.
    fn check_sender(&self, _sender: &str) -> Option<String> {
        None
    }

    /// Vets a forward path. `Some(reply)` rejects it with that reply line.
    fn check_recipient(&self, _recipient: &str) -> Option<String> {
        None
    }

    /// True if `address` names a known mailbox (used by `VRFY`).
    fn has_mailbox(&self, address: &str) -> bool;

    /// Takes ownership of an accepted message.
    fn deliver(&self, message: &MailMessage) -> Result<(), SmtpError>;
}

/// A message as stored for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: u64,
    pub sender: String,
    pub data: Bytes,
}

/// A manager that accepts every address and keeps delivered messages in memory,
/// one mailbox per recipient.
#[derive(Debug, Default)]
pub struct InMemoryManager {
    mailboxes: DashMap<String, Vec<StoredMessage>>,
    next_id: AtomicU64,
}

impl InMemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the messages delivered to `recipient`, oldest first.
    pub fn messages_for(&self, recipient: &str) -> Vec<StoredMessage> {
        self.mailboxes
            .get(&mailbox_key(recipient))
            .map(|mailbox| mailbox.value().clone())
            .unwrap_or_default()
    }

    /// The number of messages accepted so far (each counted once).
    pub fn message_count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

impl SmtpManager for InMemoryManager {
    fn has_mailbox(&self, address: &str) -> bool {
        self.mailboxes.contains_key(&mailbox_key(address))
    }

    fn deliver(&self, message: &MailMessage) -> Result<(), SmtpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        for recipient in &message.recipients {
            self.mailboxes
                .entry(mailbox_key(recipient))
                .or_default()
                .push(StoredMessage {
                    id,
                    sender: message.sender.clone(),
                    data: message.data.clone(),
                });
        }
        metrics::MESSAGES_DELIVERED_TOTAL.inc();
        info!(
            "Stored message {} from <{}> for {} recipient(s), {} bytes.",
            id,
            message.sender,
            message.recipients.len(),
            message.data.len()
        );
        Ok(())
    }
}

/// Mailbox names compare case-insensitively.
fn mailbox_key(address: &str) -> String {
    address.to_ascii_lowercase()
}
