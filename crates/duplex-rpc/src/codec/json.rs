//! JSON codec: `Document` ⇄ UTF-8 JSON bytes
//!
//! JSON connections share the dynamic `Document` model with BSON
//! connections; serde bridges the two (`serde_json::from_slice::<Document>`).
//! Decoded object keys can be rewritten with a configurable transform.

use bson::{Bson, Document};
use bytes::{BufMut, BytesMut};
use std::sync::Arc;

use super::CodecError;

/// Object-key transform applied recursively to decoded JSON documents
pub type KeyFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Encode a document as compact UTF-8 JSON, appending to `buf`
pub fn encode_document(doc: &Document, buf: &mut BytesMut) -> Result<(), CodecError> {
    serde_json::to_writer(buf.writer(), doc)?;
    Ok(())
}

/// Decode one UTF-8 JSON object from `bytes`
///
/// The top-level value must be an object; scalar or array top-level values
/// are rejected (the wire protocol has no use for them, and the BSON side
/// cannot represent them either). When `key_fn` is given, every object key
/// in the decoded tree is rewritten with it.
pub fn decode_document(bytes: &[u8], key_fn: Option<&KeyFn>) -> Result<Document, CodecError> {
    let doc: Document = serde_json::from_slice(bytes)?;
    Ok(match key_fn {
        Some(f) => transform_keys(doc, f),
        None => doc,
    })
}

/// Rewrite every object key in `doc`, recursing through arrays and
/// sub-documents
pub fn transform_keys(doc: Document, f: &KeyFn) -> Document {
    let mut out = Document::new();
    for (key, value) in doc {
        out.insert(f(&key), transform_value(value, f));
    }
    out
}

fn transform_value(value: Bson, f: &KeyFn) -> Bson {
    match value {
        Bson::Document(d) => Bson::Document(transform_keys(d, f)),
        Bson::Array(items) => {
            Bson::Array(items.into_iter().map(|v| transform_value(v, f)).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn round_trips_document() {
        let original = doc! {
            "jsonrpc": "2.0",
            "method": "echo",
            "params": ["Hello!", 42i64, Bson::Null],
            "id": 1i64,
        };
        let mut buf = BytesMut::new();
        encode_document(&original, &mut buf).unwrap();
        let decoded = decode_document(&buf, None).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn rejects_non_object_top_level() {
        assert!(decode_document(b"[1,2,3]", None).is_err());
        assert!(decode_document(b"\"text\"", None).is_err());
        assert!(decode_document(b"{\"a\": }", None).is_err());
    }

    #[test]
    fn applies_key_transform_recursively() {
        let upper: KeyFn = Arc::new(|k: &str| k.to_ascii_uppercase());
        let decoded = decode_document(
            br#"{"outer": {"inner": [{"leaf": 1}]}}"#,
            Some(&upper),
        )
        .unwrap();

        let outer = decoded.get_document("OUTER").unwrap();
        let leaf = outer.get_array("INNER").unwrap()[0]
            .as_document()
            .unwrap();
        assert!(leaf.contains_key("LEAF"));
    }
}
