// src/connection/dispatch.rs

//! Shape checks applied to a command line before it is dispatched.

use crate::core::protocol::reply::{self, MAX_COMMAND_LINE_CHARS};

/// Why a line was refused before reaching the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRejection {
    /// Shorter than four characters, or the token is not followed by a space.
    Malformed,
    /// Longer than 1000 characters.
    TooLong,
}

impl LineRejection {
    /// The reply line sent to the client.
    pub fn reply(self) -> &'static str {
        match self {
            LineRejection::Malformed => reply::INVALID_COMMAND,
            LineRejection::TooLong => reply::COMMAND_TOO_LONG,
        }
    }

    /// Label used for the rejected-lines metric.
    pub fn reason(self) -> &'static str {
        match self {
            LineRejection::Malformed => "malformed",
            LineRejection::TooLong => "too_long",
        }
    }
}

/// Validates the shape of `line` and extracts its token, upper-cased in ASCII.
///
/// The checks run in a fixed order and the first failure wins: fewer than four
/// characters, then a fifth character other than a space, then more than 1000
/// characters. Lengths count characters, not bytes.
pub fn validate_line(line: &str) -> Result<String, LineRejection> {
    let mut chars = line.chars();
    let token: String = chars.by_ref().take(4).collect();
    if token.chars().count() < 4 {
        return Err(LineRejection::Malformed);
    }
    match chars.next() {
        None => return Ok(token.to_ascii_uppercase()),
        Some(' ') => {}
        Some(_) => return Err(LineRejection::Malformed),
    }
    // Four token characters and the separator are already consumed.
    if chars.count() + 5 > MAX_COMMAND_LINE_CHARS {
        return Err(LineRejection::TooLong);
    }
    Ok(token.to_ascii_uppercase())
}

/// How a line relates to the STARTTLS trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeTrigger {
    /// Exactly `STARTTLS`.
    Exact,
    /// `STARTTLS` followed by anything at all.
    WithParameters,
}

/// Recognizes the upgrade trigger.
///
/// This runs before `validate_line` and matches the literal, upper-case
/// `STARTTLS` prefix; other spellings go through normal dispatch.
pub fn upgrade_trigger(line: &str) -> Option<UpgradeTrigger> {
    let rest = line.strip_prefix(reply::STARTTLS)?;
    if rest.is_empty() {
        Some(UpgradeTrigger::Exact)
    } else {
        Some(UpgradeTrigger::WithParameters)
    }
}
