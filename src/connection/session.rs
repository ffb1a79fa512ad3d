// src/connection/session.rs

//! Defines the state associated with a single client session.

use crate::core::state::Workspace;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;

/// The mail transaction currently being assembled (RFC 5321 §3.3).
#[derive(Debug, Default, Clone)]
pub struct Transaction {
    /// The reverse path from `MAIL FROM`.
    pub sender: Option<String>,
    /// Forward paths accepted so far via `RCPT TO`.
    pub recipients: Vec<String>,
    /// Message content received by `DATA`, dot-stuffing already undone.
    pub data: BytesMut,
}

impl Transaction {
    pub fn is_empty(&self) -> bool {
        self.sender.is_none() && self.recipients.is_empty() && self.data.is_empty()
    }
}

/// A message accepted at the end of `DATA`, ready for the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub sender: String,
    pub recipients: Vec<String>,
    pub data: Bytes,
}

/// Holds the state specific to a single client session.
#[derive(Debug)]
pub struct SessionState {
    workspace: Arc<Workspace>,
    /// The domain the client announced in `HELO`/`EHLO`.
    pub client_domain: Option<String>,
    /// True once the client greeted with `EHLO`.
    pub is_esmtp: bool,
    /// The in-progress transaction.
    pub transaction: Transaction,
}

impl SessionState {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            workspace,
            client_domain: None,
            is_esmtp: false,
            transaction: Transaction::default(),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Drops the in-progress transaction, keeping the greeting.
    pub fn clear_message(&mut self) {
        self.transaction = Transaction::default();
    }

    /// Forgets everything negotiated so far, as required after STARTTLS.
    pub fn reset(&mut self) {
        self.clear_message();
        self.client_domain = None;
        self.is_esmtp = false;
    }

    pub fn is_empty(&self) -> bool {
        self.client_domain.is_none() && !self.is_esmtp && self.transaction.is_empty()
    }

    /// Completes the transaction, leaving an empty one in its place.
    ///
    /// Returns `None` if no sender or no recipient was recorded.
    pub fn take_message(&mut self) -> Option<MailMessage> {
        let transaction = std::mem::take(&mut self.transaction);
        let sender = transaction.sender?;
        if transaction.recipients.is_empty() {
            return None;
        }
        Some(MailMessage {
            sender,
            recipients: transaction.recipients,
            data: transaction.data.freeze(),
        })
    }
}
