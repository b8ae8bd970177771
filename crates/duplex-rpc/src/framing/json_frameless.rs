//! Frameless JSON framing
//!
//! Messages are concatenated JSON objects with no separators; boundaries
//! come from an incremental scanner that tracks brace depth and string
//! state. A parser fault is irrecoverable in this mode: once the scanner
//! loses the object boundary there is no way to resynchronize. A mid-value
//! EOF is reported separately, as trailing garbage.

use std::io;

use bytes::{Bytes, BytesMut};

use crate::codec::{self, KeyFn};

use super::{Frame, FrameError, ParseErrorKind, Severity};

fn is_json_whitespace(byte: u8) -> bool {
    matches!(byte, 0x0D | 0x0A | 0x20 | 0x09)
}

/// Decoder state for frameless JSON framing
#[derive(Clone)]
pub struct FramelessFraming {
    key_fn: Option<KeyFn>,
    poisoned: bool,
}

impl FramelessFraming {
    pub fn new(key_fn: Option<KeyFn>) -> Self {
        Self {
            key_fn,
            poisoned: false,
        }
    }

    fn fatal(&mut self, src: &mut BytesMut, detail: String) -> Option<Frame> {
        self.poisoned = true;
        let bytes = src.split_to(src.len()).freeze();
        Some(Frame::Error(FrameError::new(
            ParseErrorKind::InvalidJson,
            detail,
            bytes,
            Severity::Fatal,
        )))
    }

    pub(super) fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Frame>> {
        if self.poisoned {
            src.clear();
            return Ok(None);
        }

        let mut depth = 0usize;
        let mut in_str = false;
        let mut is_escaped = false;
        let mut start = 0usize;

        for idx in 0..src.len() {
            let byte = src[idx];

            if in_str {
                if is_escaped {
                    is_escaped = false;
                } else if byte == b'\\' {
                    is_escaped = true;
                } else if byte == b'"' {
                    in_str = false;
                }
                continue;
            }

            match byte {
                b'{' => {
                    if depth == 0 {
                        start = idx;
                    }
                    depth += 1;
                }
                b'}' => {
                    if depth == 0 {
                        return Ok(self.fatal(
                            src,
                            "unbalanced '}' outside any object".to_string(),
                        ));
                    }
                    depth -= 1;
                    if depth == 0 {
                        let chunk = src.split_to(idx + 1).freeze();
                        return Ok(Some(self.parse_object(chunk, start)));
                    }
                }
                b'"' if depth > 0 => in_str = true,
                _ if depth > 0 => {}
                b if is_json_whitespace(b) => {}
                other => {
                    // a top-level value that is not an object can never be
                    // a message; the boundary scanner cannot skip it
                    return Ok(self.fatal(
                        src,
                        format!("unexpected byte 0x{other:02x} outside any object"),
                    ));
                }
            }
        }

        Ok(None)
    }

    fn parse_object(&mut self, chunk: Bytes, start: usize) -> Frame {
        match codec::json::decode_document(&chunk[start..], self.key_fn.as_ref()) {
            Ok(doc) => Frame::Message(doc),
            Err(e) => {
                self.poisoned = true;
                Frame::Error(FrameError::new(
                    ParseErrorKind::InvalidJson,
                    e.to_string(),
                    chunk,
                    Severity::Fatal,
                ))
            }
        }
    }

    pub(super) fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !self.poisoned && src.iter().any(|&b| !is_json_whitespace(b)) {
            let rest = src.split_to(src.len()).freeze();
            return Ok(Some(Frame::Error(FrameError::trailing_garbage(rest))));
        }
        src.clear();
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::sync::Arc;

    #[test]
    fn splits_concatenated_objects() {
        let mut decoder = FramelessFraming::new(None);
        let mut buf = BytesMut::from(
            &br#"{"jsonrpc":"2.0","method":"a"}{"jsonrpc":"2.0","method":"b"}"#[..],
        );

        match decoder.decode(&mut buf).unwrap() {
            Some(Frame::Message(d)) => assert_eq!(d.get_str("method").unwrap(), "a"),
            other => panic!("unexpected {other:?}"),
        }
        match decoder.decode(&mut buf).unwrap() {
            Some(Frame::Message(d)) => assert_eq!(d.get_str("method").unwrap(), "b"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn waits_for_incomplete_object() {
        let mut decoder = FramelessFraming::new(None);
        let mut buf = BytesMut::from(&br#"{"jsonrpc":"2.0","met"#[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(br#"hod":"m"}"#);
        assert!(matches!(
            decoder.decode(&mut buf).unwrap(),
            Some(Frame::Message(_))
        ));
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let mut decoder = FramelessFraming::new(None);
        let mut buf = BytesMut::from(&br#"{"text":"a { b } c \" d"}"#[..]);

        match decoder.decode(&mut buf).unwrap() {
            Some(Frame::Message(d)) => {
                assert_eq!(d.get_str("text").unwrap(), "a { b } c \" d");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_object_input_is_fatal() {
        let mut decoder = FramelessFraming::new(None);
        let mut buf = BytesMut::from(&b"[1,2,3]"[..]);

        match decoder.decode(&mut buf).unwrap() {
            Some(Frame::Error(e)) => {
                assert_eq!(e.kind, ParseErrorKind::InvalidJson);
                assert_eq!(e.severity, Severity::Fatal);
            }
            other => panic!("unexpected {other:?}"),
        }
        // poisoned afterwards
        buf.extend_from_slice(br#"{"jsonrpc":"2.0","method":"m"}"#);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn mid_value_eof_is_trailing_garbage() {
        let mut decoder = FramelessFraming::new(None);
        let mut buf = BytesMut::from(&br#"{"jsonrpc":"2.0","#[..]);

        match decoder.decode_eof(&mut buf).unwrap() {
            Some(Frame::Error(e)) => {
                assert_eq!(e.kind, ParseErrorKind::TrailingGarbage);
                assert_eq!(e.severity, Severity::Warn);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn applies_key_transform() {
        let key_fn: KeyFn = Arc::new(|k: &str| k.replace('-', "_"));
        let mut decoder = FramelessFraming::new(Some(key_fn));
        let mut buf = BytesMut::from(&br#"{"json-rpc":"2.0"}"#[..]);

        match decoder.decode(&mut buf).unwrap() {
            Some(Frame::Message(d)) => assert_eq!(d, doc! {"json_rpc": "2.0"}),
            other => panic!("unexpected {other:?}"),
        }
    }
}
