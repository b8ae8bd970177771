//! duplex-rpc - Symmetric JSON-RPC 2.0 / BSON-RPC peer
//!
//! A bidirectional RPC engine over any duplex byte stream. After connect,
//! either endpoint may send requests, await responses, or deliver
//! fire-and-forget notifications; the two sides are architecturally
//! identical. Messages follow the JSON-RPC 2.0 schema, carried either as
//! UTF-8 JSON (frameless or RFC 7464 text sequences) or as BSON documents
//! with the same shape.
//!
//! # Architecture
//!
//! The crate is organized in layers, leaves first:
//!
//! - **Codec** (`codec`): map ⇄ bytes for BSON and JSON bodies
//! - **Framing** (`framing`): byte chunks → a lazy sequence of decoded
//!   messages and typed parse errors, one decoder per framing mode
//! - **Protocol** (`protocol`): the message model and the classifier that
//!   partitions every decoded map into request / notification / response /
//!   nil-id error / schema error
//! - **Correlation** (`correlation`): outbound id generation and the
//!   pending-response table
//! - **Dispatch** (`dispatch`): the per-connection consumer loop and
//!   handler invocation
//! - **Peer** (`peer`): the connection context and the `connect_*` entry
//!   points
//!
//! # Quick Start
//!
//! ```rust
//! use duplex_rpc::{connect_json_rpc, HandlerOutcome, Handlers, Options, params};
//! use bson::Bson;
//!
//! # tokio_test::block_on(async {
//! // an in-memory duplex pipe stands in for a TCP stream
//! let (server_stream, client_stream) = tokio::io::duplex(4096);
//!
//! let mut handlers = Handlers::new();
//! handlers.register("echo", |args| async move {
//!     let [s] = params::arity(args)?;
//!     Ok(HandlerOutcome::Value(s))
//! });
//!
//! let _server = connect_json_rpc(
//!     server_stream,
//!     handlers.into(),
//!     Default::default(),
//!     Options::default(),
//! );
//! let client = connect_json_rpc(
//!     client_stream,
//!     Default::default(),
//!     Default::default(),
//!     Options::default(),
//! );
//!
//! let result = client.request("echo", vec![Bson::from("hello")]).await.unwrap();
//! assert_eq!(result, Bson::String("hello".into()));
//! # });
//! ```
//!
//! # Handlers
//!
//! Handlers receive the request's positional parameters as `Vec<Bson>` and
//! return a [`HandlerOutcome`]: a plain value, or a control outcome asking
//! the engine to close the connection and/or server after the response is
//! sent. Handler tables can also be built from a factory that receives the
//! connection context, so a handler can call back to the peer:
//!
//! ```rust
//! use duplex_rpc::{HandlerOutcome, HandlerSource, Handlers};
//! use std::sync::Arc;
//!
//! let notification_handlers = HandlerSource::with_context(|ctx| {
//!     let ctx = Arc::clone(ctx);
//!     let mut handlers = Handlers::new();
//!     handlers.register("ping", move |_args| {
//!         let ctx = Arc::clone(&ctx);
//!         async move {
//!             ctx.notify("pong", vec![]);
//!             Ok(HandlerOutcome::Value(bson::Bson::Null))
//!         }
//!     });
//!     handlers
//! });
//! ```
//!
//! # Error handling
//!
//! [`RpcContext::request`](peer::RpcContext::request) surfaces peer error
//! responses as [`RpcError::Peer`], connection teardown as
//! [`RpcError::ConnectionClosed`], a refused send as
//! [`RpcError::BufferOverflow`], and an elapsed caller timeout as
//! [`RpcError::ResponseTimeout`]. Malformed inbound traffic is answered
//! with the standard `-32700` / `-32600` error responses and, where the
//! framing mode allows it, dispatching continues.

pub mod codec;
pub mod correlation;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod peer;
pub mod protocol;

// Re-export the types most callers need from the crate root
pub use dispatch::handlers::{
    params, ControlAction, HandlerError, HandlerOutcome, HandlerSource, Handlers,
};
pub use error::RpcError;
pub use peer::{connect_bson_rpc, connect_json_rpc, JsonFraming, Options, RpcContext};
pub use protocol::{ErrorObject, Inbound, Protocol, RequestId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn public_api_is_reachable_from_the_root() {
        let proto = Protocol::new("jsonrpc");
        let msg = doc! {"jsonrpc": "2.0", "method": "m", "id": 1};
        assert!(matches!(proto.classify(msg), Inbound::Request(_)));

        let err = ErrorObject::method_not_found();
        assert_eq!(err.code, protocol::error_codes::METHOD_NOT_FOUND);

        assert!(!VERSION.is_empty());
    }
}
