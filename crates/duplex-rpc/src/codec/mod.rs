//! Codec layer: map ⇄ bytes for both wire formats
//!
//! [`bson`](self::bson) and [`json`](self::json) turn `Document` values into
//! raw bytes and back; [`bytes`](self::bytes) holds the low-level buffer
//! helpers the framing decoders build on. Framing (message boundary
//! detection) lives one layer up, in [`crate::framing`].

pub mod bson;
pub mod bytes;
pub mod json;

pub use json::KeyFn;

/// Errors produced while encoding or decoding a single message body
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// BSON serialization failed
    #[error("BSON encode error: {0}")]
    BsonEncode(#[from] ::bson::ser::Error),

    /// BSON deserialization failed
    #[error("BSON decode error: {0}")]
    BsonDecode(#[from] ::bson::de::Error),

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
