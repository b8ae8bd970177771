//! RFC 7464 JSON text-sequence framing
//!
//! Each record is `0x1E` + UTF-8 JSON + `0x0A`. Record boundaries survive
//! arbitrary corruption, so every error in this mode is recoverable: bytes
//! before the next record separator are skipped, an oversized or unparsable
//! record is dropped, and decoding continues with the following record.

use std::io;

use bytes::BytesMut;

use crate::codec::{self, bytes::find_byte, KeyFn};

use super::{Frame, FrameError, ParseErrorKind, Severity, LF, RS};

/// Decoder state for RFC 7464 record framing
#[derive(Clone)]
pub struct RecordFraming {
    max_len: i32,
    key_fn: Option<KeyFn>,
}

impl RecordFraming {
    pub fn new(max_len: i32, key_fn: Option<KeyFn>) -> Self {
        Self { max_len, key_fn }
    }

    pub(super) fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Frame>> {
        // a record needs both sentinels before anything can be judged
        if find_byte(src, RS).is_none() || find_byte(src, LF).is_none() {
            return Ok(None);
        }

        if src[0] != RS {
            // skip to the next record separator, reporting what was skipped
            let pos = match find_byte(src, RS) {
                Some(pos) => pos,
                None => return Ok(None),
            };
            let garbage = src.split_to(pos).freeze();
            return Ok(Some(Frame::Error(FrameError::new(
                ParseErrorKind::InvalidFraming,
                format!("{} byte(s) outside any record", garbage.len()),
                garbage,
                Severity::Recoverable,
            ))));
        }

        // src[0] is RS, so any LF sits strictly after it
        let end = match find_byte(&src[1..], LF) {
            Some(rel) => rel + 1,
            None => return Ok(None),
        };
        let record = src.split_to(end + 1).freeze();
        let inner = record.slice(1..record.len() - 1);

        if inner.len() as u64 > self.max_len as u64 {
            return Ok(Some(Frame::Error(FrameError::new(
                ParseErrorKind::ExceedsMaxLength,
                format!(
                    "record length {} exceeds maximum {}",
                    inner.len(),
                    self.max_len
                ),
                record,
                Severity::Recoverable,
            ))));
        }

        match codec::json::decode_document(&inner, self.key_fn.as_ref()) {
            Ok(doc) => Ok(Some(Frame::Message(doc))),
            Err(e) => Ok(Some(Frame::Error(FrameError::new(
                ParseErrorKind::InvalidJson,
                e.to_string(),
                record,
                Severity::Recoverable,
            )))),
        }
    }

    pub(super) fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            let rest = src.split_to(src.len()).freeze();
            return Ok(Some(Frame::Error(FrameError::trailing_garbage(rest))));
        }
        Ok(None)
    }
}
