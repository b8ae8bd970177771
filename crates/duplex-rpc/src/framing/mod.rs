//! Framing layer: raw byte chunks → a lazy sequence of frames
//!
//! Exactly one framing mode is chosen per connection:
//!
//! - **BSON length-prefix**: every frame starts with the document's own
//!   little-endian int32 length.
//! - **JSON frameless**: concatenated JSON objects with no separators;
//!   boundaries are found by an incremental scanner.
//! - **JSON text sequences (RFC 7464)**: `0x1E` + JSON + `0x0A` records.
//!
//! Each mode is a [`tokio_util::codec`] `Decoder`/`Encoder` pair behind the
//! [`FramingCodec`] dispatch enum, consumed through `FramedRead` /
//! `FramedWrite`. Decoded output is a union: either a message document or a
//! typed [`FrameError`] carrying the offending bytes. Only genuine I/O
//! faults surface as `std::io::Error`; malformed input always arrives
//! in-band so the dispatcher can apply the recovery policy.

use std::fmt;
use std::io;

use bson::Document;
use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{self, KeyFn};

mod bson_frames;
mod json_frameless;
mod json_records;

pub use bson_frames::BsonFraming;
pub use json_frameless::FramelessFraming;
pub use json_records::RecordFraming;

/// RFC 7464 record separator
pub(crate) const RS: u8 = 0x1E;
/// RFC 7464 record terminator
pub(crate) const LF: u8 = 0x0A;

/// Parse-error kinds emitted by the framing decoders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Declared or measured frame length exceeds the configured maximum
    ExceedsMaxLength,
    /// Bytes that cannot begin a frame in the active mode
    InvalidFraming,
    /// A frame was isolated but its JSON body does not parse
    InvalidJson,
    /// A frame was isolated but its BSON body does not parse
    InvalidBson,
    /// Leftover bytes in the buffer when the byte source drained
    TrailingGarbage,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseErrorKind::ExceedsMaxLength => "exceeds-max-length",
            ParseErrorKind::InvalidFraming => "invalid-framing",
            ParseErrorKind::InvalidJson => "invalid-json",
            ParseErrorKind::InvalidBson => "invalid-bson",
            ParseErrorKind::TrailingGarbage => "trailing-garbage",
        };
        f.write_str(s)
    }
}

/// How the dispatcher must react to a parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Report to the peer, then close the connection
    Fatal,
    /// Report to the peer and keep dispatching
    Recoverable,
    /// Log only (the stream is draining anyway)
    Warn,
}

/// A parse error produced in-band by a framing decoder
#[derive(Debug, Clone)]
pub struct FrameError {
    pub kind: ParseErrorKind,
    /// Human-readable diagnostic, sent to the peer as parse-error `data`
    pub detail: String,
    /// The offending bytes, as far as they could be isolated
    pub bytes: Bytes,
    /// Recovery policy for this error in the active framing mode
    pub severity: Severity,
}

impl FrameError {
    pub(crate) fn new(
        kind: ParseErrorKind,
        detail: impl Into<String>,
        bytes: Bytes,
        severity: Severity,
    ) -> Self {
        Self {
            kind,
            detail: detail.into(),
            bytes,
            severity,
        }
    }

    pub(crate) fn trailing_garbage(bytes: Bytes) -> Self {
        Self::new(
            ParseErrorKind::TrailingGarbage,
            format!("{} trailing byte(s) at end of stream", bytes.len()),
            bytes,
            Severity::Warn,
        )
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// One element of the decoded stream: a message or a parse error
#[derive(Debug, Clone)]
pub enum Frame {
    Message(Document),
    Error(FrameError),
}

/// Framing codec for one connection, dispatching on the chosen mode
#[derive(Clone)]
pub enum FramingCodec {
    Bson(BsonFraming),
    Json(FramelessFraming),
    JsonRecords(RecordFraming),
}

impl FramingCodec {
    /// BSON length-prefix framing with the given frame-length cap
    pub fn bson(max_len: i32) -> Self {
        FramingCodec::Bson(BsonFraming::new(max_len))
    }

    /// Frameless JSON framing (streaming boundary detection)
    pub fn json(key_fn: Option<KeyFn>) -> Self {
        FramingCodec::Json(FramelessFraming::new(key_fn))
    }

    /// RFC 7464 record framing with the given record-length cap
    pub fn json_records(max_len: i32, key_fn: Option<KeyFn>) -> Self {
        FramingCodec::JsonRecords(RecordFraming::new(max_len, key_fn))
    }
}

impl Decoder for FramingCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        match self {
            FramingCodec::Bson(d) => d.decode(src),
            FramingCodec::Json(d) => d.decode(src),
            FramingCodec::JsonRecords(d) => d.decode(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        match self {
            FramingCodec::Bson(d) => d.decode_eof(src),
            FramingCodec::Json(d) => d.decode_eof(src),
            FramingCodec::JsonRecords(d) => d.decode_eof(src),
        }
    }
}

impl Encoder<Document> for FramingCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Document, dst: &mut BytesMut) -> Result<(), io::Error> {
        use bytes::BufMut;

        let encoded = match self {
            FramingCodec::Bson(_) => codec::bson::encode_document(&item, dst),
            FramingCodec::Json(_) => codec::json::encode_document(&item, dst),
            FramingCodec::JsonRecords(_) => {
                dst.put_u8(RS);
                let res = codec::json::encode_document(&item, dst);
                dst.put_u8(LF);
                res
            }
        };
        encoded.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn encodes_per_mode() {
        let msg = doc! {"jsonrpc": "2.0", "method": "m"};

        let mut buf = BytesMut::new();
        FramingCodec::json(None).encode(msg.clone(), &mut buf).unwrap();
        assert_eq!(&buf[..], br#"{"jsonrpc":"2.0","method":"m"}"#);

        let mut buf = BytesMut::new();
        FramingCodec::json_records(i32::MAX, None)
            .encode(msg.clone(), &mut buf)
            .unwrap();
        assert_eq!(buf[0], RS);
        assert_eq!(buf[buf.len() - 1], LF);

        let mut buf = BytesMut::new();
        FramingCodec::bson(i32::MAX).encode(msg, &mut buf).unwrap();
        let len = i32::from_le_bytes(buf[..4].try_into().unwrap()) as usize;
        assert_eq!(len, buf.len());
    }
}
