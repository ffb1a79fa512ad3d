// src/core/commands/mod.rs

//! Command handlers and the registry that maps tokens to them.

pub mod command_trait;
pub mod helpers;
pub mod registry;

mod data;
mod ehlo;
mod helo;
mod mail;
mod noop;
mod quit;
mod rcpt;
mod rset;
mod vrfy;

pub use command_trait::SmtpCommand;
pub use data::Data;
pub use ehlo::Ehlo;
pub use helo::Helo;
pub use mail::Mail;
pub use noop::Noop;
pub use quit::Quit;
pub use rcpt::Rcpt;
pub use registry::{Command, CommandRegistry, CommandRegistryBuilder};
pub use rset::Rset;
pub use vrfy::Vrfy;
