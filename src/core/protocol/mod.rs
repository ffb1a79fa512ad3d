// src/core/protocol/mod.rs

//! Wire-level pieces of the SMTP dialogue: line framing and the fixed replies
//! the session engine emits itself.

pub mod line_codec;
pub mod reply;

pub use line_codec::{LineCodec, LineFrame, OVERFLOW_HEAD_BYTES};
