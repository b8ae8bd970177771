//! BSON codec: `Document` ⇄ raw BSON bytes
//!
//! BSON documents are self-delimiting (leading little-endian length,
//! trailing `0x00`), so the encoded form is also the wire frame.

use std::io::Cursor;

use bson::Document;
use bytes::{BufMut, BytesMut};

use super::CodecError;

/// Encode a document as BSON, appending to `buf`
pub fn encode_document(doc: &Document, buf: &mut BytesMut) -> Result<(), CodecError> {
    doc.to_writer(buf.writer())?;
    Ok(())
}

/// Decode one BSON document from `bytes`
pub fn decode_document(bytes: &[u8]) -> Result<Document, CodecError> {
    Ok(Document::from_reader(Cursor::new(bytes))?)
}
