//! BSON length-prefix framing
//!
//! Every frame begins with a little-endian signed 32-bit length that counts
//! itself and the trailing `0x00`. Length-check failures poison the decoder:
//! without a trustworthy length there is no way to find the next frame
//! boundary, so the error is irrecoverable. A frame that was isolated but
//! does not parse as BSON is transient; the boundary is intact and decoding
//! continues with the next frame.

use std::io;

use bytes::{Bytes, BytesMut};

use crate::codec::{self, bytes::peek_i32_le};

use super::{Frame, FrameError, ParseErrorKind, Severity};

/// Smallest legal BSON document: int32 length + terminating 0x00
const MIN_DOCUMENT_LEN: i32 = 5;

/// Decoder state for BSON length-prefix framing
#[derive(Debug, Clone)]
pub struct BsonFraming {
    max_len: i32,
    poisoned: bool,
}

impl BsonFraming {
    pub fn new(max_len: i32) -> Self {
        Self {
            max_len,
            poisoned: false,
        }
    }

    pub(super) fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Frame>> {
        if self.poisoned {
            src.clear();
            return Ok(None);
        }

        let len = match peek_i32_le(src) {
            Some(len) => len,
            None => return Ok(None),
        };

        // widen before comparing so a hostile prefix cannot wrap
        if i64::from(len) > i64::from(self.max_len) {
            self.poisoned = true;
            return Ok(Some(Frame::Error(FrameError::new(
                ParseErrorKind::ExceedsMaxLength,
                format!("declared frame length {len} exceeds maximum {}", self.max_len),
                Bytes::copy_from_slice(&src[..4]),
                Severity::Fatal,
            ))));
        }
        if len < MIN_DOCUMENT_LEN {
            self.poisoned = true;
            return Ok(Some(Frame::Error(FrameError::new(
                ParseErrorKind::InvalidFraming,
                format!("declared frame length {len} is below the BSON minimum"),
                Bytes::copy_from_slice(&src[..4]),
                Severity::Fatal,
            ))));
        }

        let len = len as usize;
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(len).freeze();
        match codec::bson::decode_document(&frame) {
            Ok(doc) => Ok(Some(Frame::Message(doc))),
            Err(e) => Ok(Some(Frame::Error(FrameError::new(
                ParseErrorKind::InvalidBson,
                e.to_string(),
                frame,
                Severity::Recoverable,
            )))),
        }
    }

    pub(super) fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() && !self.poisoned {
            let rest = src.split_to(src.len()).freeze();
            return Ok(Some(Frame::Error(FrameError::trailing_garbage(rest))));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn encode(doc: &bson::Document) -> BytesMut {
        let mut buf = BytesMut::new();
        codec::bson::encode_document(doc, &mut buf).unwrap();
        buf
    }

    #[test]
    fn decodes_back_to_back_frames() {
        let mut decoder = BsonFraming::new(i32::MAX);
        let mut buf = encode(&doc! {"a": 1i32});
        buf.extend_from_slice(&encode(&doc! {"b": 2i32}));

        match decoder.decode(&mut buf).unwrap() {
            Some(Frame::Message(d)) => assert_eq!(d, doc! {"a": 1i32}),
            other => panic!("unexpected {other:?}"),
        }
        match decoder.decode(&mut buf).unwrap() {
            Some(Frame::Message(d)) => assert_eq!(d, doc! {"b": 2i32}),
            other => panic!("unexpected {other:?}"),
        }
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn waits_for_partial_frame() {
        let mut decoder = BsonFraming::new(i32::MAX);
        let full = encode(&doc! {"key": "value"});

        let mut buf = BytesMut::from(&full[..full.len() - 3]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&full[full.len() - 3..]);
        assert!(matches!(
            decoder.decode(&mut buf).unwrap(),
            Some(Frame::Message(_))
        ));
    }

    #[test]
    fn oversized_length_is_fatal() {
        let mut decoder = BsonFraming::new(64);
        let mut buf = BytesMut::from(&1024i32.to_le_bytes()[..]);

        match decoder.decode(&mut buf).unwrap() {
            Some(Frame::Error(e)) => {
                assert_eq!(e.kind, ParseErrorKind::ExceedsMaxLength);
                assert_eq!(e.severity, Severity::Fatal);
            }
            other => panic!("unexpected {other:?}"),
        }
        // poisoned: later input is discarded
        buf.extend_from_slice(&encode(&doc! {"a": 1i32}));
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn short_length_is_fatal() {
        let mut decoder = BsonFraming::new(i32::MAX);
        for bad in [0i32, 4, -1] {
            let mut d = decoder.clone();
            let mut buf = BytesMut::from(&bad.to_le_bytes()[..]);
            match d.decode(&mut buf).unwrap() {
                Some(Frame::Error(e)) => {
                    assert_eq!(e.kind, ParseErrorKind::InvalidFraming);
                    assert_eq!(e.severity, Severity::Fatal);
                }
                other => panic!("unexpected {other:?} for length {bad}"),
            }
        }
    }

    #[test]
    fn corrupt_body_is_transient() {
        let mut decoder = BsonFraming::new(i32::MAX);
        let mut buf = encode(&doc! {"a": 1i32});
        let last = buf.len() - 1;
        buf[last] = 0xFF; // clobber the terminator
        buf.extend_from_slice(&encode(&doc! {"b": 2i32}));

        match decoder.decode(&mut buf).unwrap() {
            Some(Frame::Error(e)) => {
                assert_eq!(e.kind, ParseErrorKind::InvalidBson);
                assert_eq!(e.severity, Severity::Recoverable);
            }
            other => panic!("unexpected {other:?}"),
        }
        // next frame still decodes
        assert!(matches!(
            decoder.decode(&mut buf).unwrap(),
            Some(Frame::Message(_))
        ));
    }

    #[test]
    fn drain_with_leftover_warns() {
        let mut decoder = BsonFraming::new(i32::MAX);
        let mut buf = BytesMut::from(&b"\x20\x00"[..]);

        match decoder.decode_eof(&mut buf).unwrap() {
            Some(Frame::Error(e)) => {
                assert_eq!(e.kind, ParseErrorKind::TrailingGarbage);
                assert_eq!(e.severity, Severity::Warn);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }
}
