//! Message classification
//!
//! A pure function over decoded documents that partitions every message into
//! exactly one of: request, notification, success response, error response,
//! nil-id error response, or schema error. Predicates are evaluated
//! method-first, so a map carrying both `method` and `result` classifies as
//! a request.

use bson::{Bson, Document};

use super::message::{ErrorObject, RequestId};
use super::Protocol;

/// An inbound request: `method` plus positional params, with an `id` that
/// may be an explicit null (`None`)
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    pub method: String,
    pub params: Vec<Bson>,
    pub id: Option<RequestId>,
}

/// An inbound notification: `method` plus positional params, no `id`
#[derive(Debug, Clone, PartialEq)]
pub struct InboundNotification {
    pub method: String,
    pub params: Vec<Bson>,
}

/// An inbound response correlated by `id`: either a result or a peer error
#[derive(Debug, Clone, PartialEq)]
pub struct InboundResponse {
    pub id: RequestId,
    pub outcome: Result<Bson, ErrorObject>,
}

/// The classification partition over decoded messages
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Request(InboundRequest),
    Notification(InboundNotification),
    Response(InboundResponse),
    /// An error response whose `id` is null; peers use this to report parse
    /// errors that could not be correlated to a request
    NilIdError(ErrorObject),
    /// Anything that satisfies none of the message predicates; the original
    /// document is retained for diagnostics and the invalid-request reply
    SchemaError(Document),
}

/// Positional-argument extraction from a raw `params` value.
///
/// Absent params yield no arguments, an array yields its elements, and any
/// other value is passed through as a single argument (inherited leniency:
/// non-array params are not rejected).
fn params_to_args(params: Option<&Bson>) -> Vec<Bson> {
    match params {
        None => Vec::new(),
        Some(Bson::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

impl Protocol {
    /// Classify a decoded document per the message predicates
    ///
    /// # Examples
    ///
    /// ```rust
    /// use duplex_rpc::protocol::{Inbound, Protocol};
    /// use bson::doc;
    ///
    /// let proto = Protocol::new("jsonrpc");
    /// let msg = doc! {"jsonrpc": "2.0", "method": "ping"};
    /// assert!(matches!(proto.classify(msg), Inbound::Notification(_)));
    /// ```
    pub fn classify(&self, doc: Document) -> Inbound {
        if doc.get_str(self.tag()).ok() != Some(super::constants::PROTOCOL_VERSION) {
            return Inbound::SchemaError(doc);
        }

        if let Some(method) = doc.get("method") {
            let method = match method.as_str() {
                Some(m) if !m.is_empty() => m.to_string(),
                _ => return Inbound::SchemaError(doc),
            };
            let params = params_to_args(doc.get("params"));

            return match doc.get("id") {
                None => Inbound::Notification(InboundNotification { method, params }),
                Some(id) => match RequestId::from_bson(id) {
                    Some(id) => Inbound::Request(InboundRequest { method, params, id }),
                    None => Inbound::SchemaError(doc),
                },
            };
        }

        let has_result = doc.contains_key("result");
        let error = doc.get_document("error").ok().and_then(ErrorObject::from_document);

        match doc.get("id").and_then(RequestId::from_bson) {
            Some(Some(id)) => {
                if has_result && !doc.contains_key("error") {
                    // get() cannot fail here, result presence was just checked
                    let result = doc.get("result").cloned().unwrap_or(Bson::Null);
                    Inbound::Response(InboundResponse {
                        id,
                        outcome: Ok(result),
                    })
                } else if let (Some(error), false) = (error, has_result) {
                    Inbound::Response(InboundResponse {
                        id,
                        outcome: Err(error),
                    })
                } else {
                    Inbound::SchemaError(doc)
                }
            }
            Some(None) => match (error, has_result) {
                (Some(error), false) => Inbound::NilIdError(error),
                _ => Inbound::SchemaError(doc),
            },
            None => Inbound::SchemaError(doc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn proto() -> Protocol {
        Protocol::new("jsonrpc")
    }

    #[test]
    fn classifies_request() {
        let msg = doc! {"jsonrpc": "2.0", "method": "echo", "params": ["x"], "id": 1};
        match proto().classify(msg) {
            Inbound::Request(req) => {
                assert_eq!(req.method, "echo");
                assert_eq!(req.params, vec![Bson::String("x".into())]);
                assert_eq!(req.id, Some(RequestId::Number(1)));
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn classifies_null_id_request() {
        let msg = doc! {"jsonrpc": "2.0", "method": "echo", "id": Bson::Null};
        match proto().classify(msg) {
            Inbound::Request(req) => assert_eq!(req.id, None),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn classifies_notification() {
        let msg = doc! {"jsonrpc": "2.0", "method": "note", "params": [1, 2]};
        match proto().classify(msg) {
            Inbound::Notification(n) => {
                assert_eq!(n.method, "note");
                assert_eq!(n.params.len(), 2);
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn classifies_success_response() {
        let msg = doc! {"jsonrpc": "2.0", "result": "ok", "id": "id-1"};
        match proto().classify(msg) {
            Inbound::Response(r) => {
                assert_eq!(r.id, RequestId::String("id-1".into()));
                assert_eq!(r.outcome, Ok(Bson::String("ok".into())));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn classifies_error_response() {
        let msg = doc! {
            "jsonrpc": "2.0",
            "error": {"code": -32601, "message": "Method not found"},
            "id": 3,
        };
        match proto().classify(msg) {
            Inbound::Response(r) => {
                let err = r.outcome.unwrap_err();
                assert_eq!(err.code, -32601);
                assert_eq!(err.message, "Method not found");
            }
            other => panic!("expected error response, got {other:?}"),
        }
    }

    #[test]
    fn classifies_nil_id_error() {
        let msg = doc! {
            "jsonrpc": "2.0",
            "error": {"code": -32700, "message": "Parse error"},
            "id": Bson::Null,
        };
        match proto().classify(msg) {
            Inbound::NilIdError(err) => assert_eq!(err.code, -32700),
            other => panic!("expected nil-id error, got {other:?}"),
        }
    }

    #[test]
    fn schema_errors() {
        let cases = vec![
            // wrong protocol version
            doc! {"jsonrpc": "1.0", "method": "m", "id": 1},
            // missing protocol tag
            doc! {"method": "m", "id": 1},
            // empty method
            doc! {"jsonrpc": "2.0", "method": "", "id": 1},
            // non-string method
            doc! {"jsonrpc": "2.0", "method": 7, "id": 1},
            // id of an unsupported type
            doc! {"jsonrpc": "2.0", "method": "m", "id": 1.5},
            // response with both result and error
            doc! {"jsonrpc": "2.0", "result": 1, "error": {"code": 1, "message": "m"}, "id": 1},
            // error response with a malformed error object
            doc! {"jsonrpc": "2.0", "error": {"code": "x", "message": "m"}, "id": 1},
            // success response with null id
            doc! {"jsonrpc": "2.0", "result": 1, "id": Bson::Null},
            // response with no id at all
            doc! {"jsonrpc": "2.0", "result": 1},
            // nothing recognizable
            doc! {"jsonrpc": "2.0", "payload": true},
        ];
        for msg in cases {
            assert!(
                matches!(proto().classify(msg.clone()), Inbound::SchemaError(_)),
                "expected schema error for {msg}"
            );
        }
    }

    #[test]
    fn method_wins_over_result_keys() {
        let msg = doc! {"jsonrpc": "2.0", "method": "m", "result": 1, "id": 1};
        assert!(matches!(proto().classify(msg), Inbound::Request(_)));
    }

    #[test]
    fn non_array_params_pass_through_as_one_argument() {
        let msg = doc! {"jsonrpc": "2.0", "method": "m", "params": {"k": 1}};
        match proto().classify(msg) {
            Inbound::Notification(n) => assert_eq!(n.params.len(), 1),
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn respects_configured_tag() {
        let proto = Protocol::new("bsonrpc");
        let good = doc! {"bsonrpc": "2.0", "method": "m"};
        let bad = doc! {"jsonrpc": "2.0", "method": "m"};
        assert!(matches!(proto.classify(good), Inbound::Notification(_)));
        assert!(matches!(proto.classify(bad), Inbound::SchemaError(_)));
    }
}
