//! Peer layer: connection context and public entry points
//!
//! [`connect_bson_rpc`] / [`connect_json_rpc`] build an [`RpcContext`] over
//! a caller-supplied duplex stream; [`Options`] carries the per-connection
//! configuration.

pub mod connect;
pub mod context;
pub mod options;

pub use connect::{connect_bson_rpc, connect_json_rpc};
pub use context::RpcContext;
pub use options::{
    ConnectionHook, InvalidIdResponseHook, JsonFraming, NilIdErrorHook, NotificationErrorHook,
    Options, ServerCloser,
};
