//! Core wire message types with a dynamic map representation
//!
//! Messages travel as `bson::Document` values regardless of codec: BSON
//! connections decode documents natively and JSON connections decode into
//! `Document` through serde. The protocol-tag key (`"jsonrpc"` /
//! `"bsonrpc"`) is configurable per connection, so outbound messages are
//! built by a [`Protocol`] value holding the tag instead of serde derives
//! with a fixed field name.

use std::fmt;

use bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

use super::constants::{error_codes, error_messages, PROTOCOL_VERSION};

/// Request ID supporting both string and numeric formats
///
/// The protocol allows request IDs to be strings, numbers, or null. This
/// enum covers the string and numeric variants; a null ID is represented by
/// `Option<RequestId>`.
///
/// # Examples
///
/// ```rust
/// use duplex_rpc::protocol::RequestId;
///
/// let string_id = RequestId::new_string("req-123");
/// let numeric_id = RequestId::new_number(42);
/// assert_ne!(string_id, numeric_id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestId {
    /// String-based request identifier
    String(String),
    /// Numeric request identifier
    Number(i64),
}

impl RequestId {
    /// Create a new string-based request ID
    pub fn new_string(id: impl Into<String>) -> Self {
        RequestId::String(id.into())
    }

    /// Create a new numeric request ID
    pub fn new_number(id: i64) -> Self {
        RequestId::Number(id)
    }

    /// Extract a request ID from a wire value
    ///
    /// Returns `Some(None)` for an explicit null, `Some(Some(id))` for a
    /// string or integer, and `None` for any other value.
    pub fn from_bson(value: &Bson) -> Option<Option<RequestId>> {
        match value {
            Bson::Null => Some(None),
            Bson::String(s) => Some(Some(RequestId::String(s.clone()))),
            Bson::Int32(n) => Some(Some(RequestId::Number(i64::from(*n)))),
            Bson::Int64(n) => Some(Some(RequestId::Number(*n))),
            _ => None,
        }
    }

    /// Render this ID as a wire value
    pub fn to_bson(&self) -> Bson {
        match self {
            RequestId::String(s) => Bson::String(s.clone()),
            RequestId::Number(n) => Bson::Int64(*n),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Render an optional (possibly null) request ID as a wire value
pub(crate) fn id_to_bson(id: &Option<RequestId>) -> Bson {
    match id {
        Some(id) => id.to_bson(),
        None => Bson::Null,
    }
}

/// Error object carried in failure responses
///
/// Mirrors the JSON-RPC 2.0 error shape: a numeric `code`, a short
/// `message`, and optional `data` with additional diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Numeric error code
    pub code: i32,
    /// Short human-readable summary
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bson>,
}

impl ErrorObject {
    /// Create an error object with an arbitrary code and message
    pub fn new(code: i32, message: impl Into<String>, data: Option<Bson>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    /// `-32700` parse error, with a description of the offending bytes
    pub fn parse_error(data: impl Into<String>) -> Self {
        Self::new(
            error_codes::PARSE_ERROR,
            error_messages::PARSE_ERROR,
            Some(Bson::String(data.into())),
        )
    }

    /// `-32600` invalid request, carrying the offending message
    pub fn invalid_request(data: Bson) -> Self {
        Self::new(
            error_codes::INVALID_REQUEST,
            error_messages::INVALID_REQUEST,
            Some(data),
        )
    }

    /// `-32601` method not found
    pub fn method_not_found() -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            error_messages::METHOD_NOT_FOUND,
            None,
        )
    }

    /// `-32602` invalid params, with a textual diagnostic
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(
            error_codes::INVALID_PARAMS,
            error_messages::INVALID_PARAMS,
            Some(Bson::String(detail.into())),
        )
    }

    /// `-32000` server error, with a textual diagnostic
    pub fn server_error(detail: impl Into<String>) -> Self {
        Self::new(
            error_codes::SERVER_ERROR,
            error_messages::SERVER_ERROR,
            Some(Bson::String(detail.into())),
        )
    }

    /// Render this error as a wire document
    pub fn to_document(&self) -> Document {
        let mut d = doc! {
            "code": self.code,
            "message": self.message.as_str(),
        };
        if let Some(data) = &self.data {
            d.insert("data", data.clone());
        }
        d
    }

    /// Validate and extract an error object from a wire document
    ///
    /// The `code` must be an integer and the `message` a string; anything
    /// else is rejected so the classifier can fall through to schema-error.
    pub fn from_document(d: &Document) -> Option<Self> {
        let code = match d.get("code") {
            Some(Bson::Int32(n)) => *n,
            Some(Bson::Int64(n)) => i32::try_from(*n).ok()?,
            _ => return None,
        };
        let message = d.get_str("message").ok()?.to_string();
        Some(Self {
            code,
            message,
            data: d.get("data").cloned(),
        })
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Outbound message builder bound to a protocol-tag key
///
/// One `Protocol` value per connection; every document it produces carries
/// `<tag>: "2.0"`.
///
/// # Examples
///
/// ```rust
/// use duplex_rpc::protocol::{Protocol, RequestId};
/// use bson::Bson;
///
/// let proto = Protocol::new("jsonrpc");
/// let req = proto.request("echo", vec![Bson::from("hi")], &RequestId::new_number(1));
/// assert_eq!(req.get_str("jsonrpc").unwrap(), "2.0");
/// assert_eq!(req.get_str("method").unwrap(), "echo");
/// ```
#[derive(Debug, Clone)]
pub struct Protocol {
    tag: String,
}

impl Protocol {
    /// Create a builder for the given protocol-tag key
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// The protocol-tag key this builder stamps on messages
    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn base(&self) -> Document {
        let mut d = Document::new();
        d.insert(self.tag.as_str(), PROTOCOL_VERSION);
        d
    }

    /// Build a request document
    pub fn request(&self, method: &str, params: Vec<Bson>, id: &RequestId) -> Document {
        let mut d = self.base();
        d.insert("method", method);
        d.insert("params", Bson::Array(params));
        d.insert("id", id.to_bson());
        d
    }

    /// Build a notification document (no `id`)
    pub fn notification(&self, method: &str, params: Vec<Bson>) -> Document {
        let mut d = self.base();
        d.insert("method", method);
        d.insert("params", Bson::Array(params));
        d
    }

    /// Build a success response for the given request ID
    pub fn success(&self, id: Bson, result: Bson) -> Document {
        let mut d = self.base();
        d.insert("result", result);
        d.insert("id", id);
        d
    }

    /// Build an error response for the given request ID (null for parse errors)
    pub fn failure(&self, id: Bson, error: &ErrorObject) -> Document {
        let mut d = self.base();
        d.insert("error", error.to_document());
        d.insert("id", id);
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_from_wire_values() {
        assert_eq!(RequestId::from_bson(&Bson::Null), Some(None));
        assert_eq!(
            RequestId::from_bson(&Bson::Int32(7)),
            Some(Some(RequestId::Number(7)))
        );
        assert_eq!(
            RequestId::from_bson(&Bson::Int64(7)),
            Some(Some(RequestId::Number(7)))
        );
        assert_eq!(
            RequestId::from_bson(&Bson::String("a".into())),
            Some(Some(RequestId::String("a".into())))
        );
        assert_eq!(RequestId::from_bson(&Bson::Double(1.5)), None);
        assert_eq!(RequestId::from_bson(&Bson::Boolean(true)), None);
    }

    #[test]
    fn request_document_shape() {
        let proto = Protocol::new("bsonrpc");
        let d = proto.request("sum", vec![Bson::Int64(1), Bson::Int64(2)], &RequestId::new_string("id-1"));

        assert_eq!(d.get_str("bsonrpc").unwrap(), "2.0");
        assert_eq!(d.get_str("method").unwrap(), "sum");
        assert_eq!(d.get_str("id").unwrap(), "id-1");
        assert_eq!(d.get_array("params").unwrap().len(), 2);
    }

    #[test]
    fn notification_has_no_id() {
        let proto = Protocol::new("jsonrpc");
        let d = proto.notification("tick", vec![]);

        assert!(!d.contains_key("id"));
        assert_eq!(d.get_str("method").unwrap(), "tick");
    }

    #[test]
    fn failure_document_carries_error_object() {
        let proto = Protocol::new("jsonrpc");
        let err = ErrorObject::invalid_params("expected 1 parameter, got 3");
        let d = proto.failure(Bson::Int64(4), &err);

        let e = d.get_document("error").unwrap();
        assert_eq!(e.get_i32("code").unwrap(), -32602);
        assert_eq!(e.get_str("message").unwrap(), "Invalid params");
        assert!(e.get_str("data").unwrap().contains("expected 1 parameter"));
        assert!(!d.contains_key("result"));
    }

    #[test]
    fn error_object_round_trip() {
        let err = ErrorObject::server_error("boom");
        let parsed = ErrorObject::from_document(&err.to_document()).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn error_object_rejects_bad_shapes() {
        assert!(ErrorObject::from_document(&doc! {"code": "x", "message": "m"}).is_none());
        assert!(ErrorObject::from_document(&doc! {"code": 1}).is_none());
        assert!(ErrorObject::from_document(&doc! {"message": "m"}).is_none());
    }
}
