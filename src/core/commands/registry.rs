// src/core/commands/registry.rs

//! The immutable table mapping 4-character tokens to their handlers.

use super::command_trait::SmtpCommand;
use super::{Data, Ehlo, Helo, Mail, Noop, Quit, Rcpt, Rset, Vrfy};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A command token paired with the handler that implements it.
#[derive(Clone)]
pub struct Command {
    token: String,
    handler: Arc<dyn SmtpCommand>,
}

impl Command {
    /// Pairs `token` with `handler`. The token is stored upper-cased.
    ///
    /// # Panics
    ///
    /// Panics if `token` is not exactly four ASCII letters. Registries are
    /// assembled at startup, so a bad token is a programming error.
    pub fn new(token: &str, handler: Arc<dyn SmtpCommand>) -> Self {
        assert!(
            token.len() == 4 && token.bytes().all(|b| b.is_ascii_alphabetic()),
            "command token must be four ASCII letters, got {token:?}"
        );
        Self {
            token: token.to_ascii_uppercase(),
            handler,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn handler(&self) -> &dyn SmtpCommand {
        self.handler.as_ref()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Command").field(&self.token).finish()
    }
}

/// Token-to-handler lookup shared by every session.
///
/// Built once with `CommandRegistry::builder()` (or `standard()`); there is no
/// way to mutate it afterwards, so lookups need no synchronization.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Command>,
}

impl CommandRegistry {
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::default()
    }

    /// The RFC 5321 commands this server implements out of the box.
    pub fn standard() -> Self {
        Self::builder()
            .register("HELO", Helo)
            .register("EHLO", Ehlo)
            .register("MAIL", Mail)
            .register("RCPT", Rcpt)
            .register("DATA", Data)
            .register("RSET", Rset)
            .register("NOOP", Noop)
            .register("VRFY", Vrfy)
            .register("QUIT", Quit)
            .build()
    }

    /// Finds the command for an already upper-cased token.
    pub fn lookup(&self, token: &str) -> Option<&Command> {
        self.commands.get(token)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.commands.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// All registered tokens, sorted.
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.tokens()).finish()
    }
}

#[derive(Default)]
pub struct CommandRegistryBuilder {
    commands: HashMap<String, Command>,
}

impl CommandRegistryBuilder {
    /// Adds a handler, replacing any earlier one for the same token.
    pub fn register(self, token: &str, handler: impl SmtpCommand + 'static) -> Self {
        self.register_arc(token, Arc::new(handler))
    }

    pub fn register_arc(mut self, token: &str, handler: Arc<dyn SmtpCommand>) -> Self {
        let command = Command::new(token, handler);
        self.commands.insert(command.token.clone(), command);
        self
    }

    pub fn build(self) -> CommandRegistry {
        CommandRegistry {
            commands: self.commands,
        }
    }
}
