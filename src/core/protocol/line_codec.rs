// src/core/protocol/line_codec.rs

//! Implements the CRLF line framing used by SMTP, as an `Encoder`/`Decoder`
//! pair for `tokio_util::codec::Framed`.

use crate::core::SmtpError;
use bytes::{Buf, BufMut, BytesMut};
use std::cmp;
use tokio_util::codec::{Decoder, Encoder};

/// The CRLF sequence terminating every line written to the peer.
const CRLF: &[u8] = b"\r\n";

/// Default hard cap for a single inbound line, terminator excluded.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// How much of an over-long line is kept so the caller can still tell what it was.
pub const OVERFLOW_HEAD_BYTES: usize = 16;

/// A single decoded unit of inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineFrame {
    /// A complete line with its terminator stripped.
    Line(String),
    /// A line longer than the codec's cap. Its bytes were discarded up to and
    /// including the terminator; only the first `OVERFLOW_HEAD_BYTES` survive
    /// in `head`.
    Overflow { head: String },
}

/// Line codec that accepts both `\r\n` and bare `\n` terminators.
///
/// Unlike `LinesCodec`, an over-long line is not an error: the decoder drops it
/// and yields `LineFrame::Overflow`, so the `Framed` stream keeps working.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Index in the buffer up to which we already know there is no `\n`.
    next_index: usize,
    discarding: bool,
    /// Start of the line being discarded.
    discarded_head: String,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_BYTES)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
            discarded_head: String::new(),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn take_overflow(&mut self) -> LineFrame {
        LineFrame::Overflow {
            head: std::mem::take(&mut self.discarded_head),
        }
    }
}

/// The first bytes of the line at the start of `bytes`, terminator excluded.
fn head_of(bytes: &[u8]) -> String {
    let mut head = &bytes[..cmp::min(bytes.len(), OVERFLOW_HEAD_BYTES)];
    if let Some(pos) = head.iter().position(|b| *b == b'\n') {
        head = &head[..pos];
    }
    if let Some(stripped) = head.strip_suffix(b"\r") {
        head = stripped;
    }
    String::from_utf8_lossy(head).into_owned()
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = LineFrame;
    type Error = SmtpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.discarding {
                match src.iter().position(|b| *b == b'\n') {
                    Some(pos) => {
                        src.advance(pos + 1);
                        self.discarding = false;
                        return Ok(Some(self.take_overflow()));
                    }
                    None => {
                        src.clear();
                        return Ok(None);
                    }
                }
            }

            // `max_length` content bytes plus CRLF is the longest acceptable frame.
            let window = self.max_length.saturating_add(2);
            let read_to = cmp::min(window, src.len());
            let newline = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            if let Some(offset) = newline {
                let end = self.next_index + offset;
                self.next_index = 0;
                let mut line = src.split_to(end + 1);
                line.truncate(end);
                if line.last() == Some(&b'\r') {
                    line.truncate(end - 1);
                }
                if line.len() > self.max_length {
                    return Ok(Some(LineFrame::Overflow { head: head_of(&line) }));
                }
                return Ok(Some(LineFrame::Line(
                    String::from_utf8_lossy(&line).into_owned(),
                )));
            }

            if src.len() >= window {
                self.next_index = 0;
                self.discarding = true;
                // The buffer always starts at a line boundary.
                self.discarded_head = head_of(&src[..]);
                continue;
            }

            self.next_index = read_to;
            return Ok(None);
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if self.discarding => {
                self.discarding = false;
                buf.clear();
                Ok(Some(self.take_overflow()))
            }
            None if buf.is_empty() => Ok(None),
            None => {
                // A final unterminated line is still delivered.
                let line = buf.split_to(buf.len());
                self.next_index = 0;
                Ok(Some(LineFrame::Line(
                    String::from_utf8_lossy(&line).into_owned(),
                )))
            }
        }
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = SmtpError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.as_ref();
        dst.reserve(line.len() + CRLF.len());
        dst.put(line.as_bytes());
        dst.put(CRLF);
        Ok(())
    }
}
