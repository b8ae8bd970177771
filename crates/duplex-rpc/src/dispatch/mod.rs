//! Dispatch layer: inbound message routing and handler invocation
//!
//! The [`dispatcher`] module owns the per-connection consumer loop;
//! [`handlers`] defines the user-facing handler tables and outcomes;
//! [`invoke`] maps handler results onto wire responses.

pub mod handlers;

pub(crate) mod dispatcher;
pub(crate) mod invoke;

pub use handlers::{
    params, ControlAction, Handler, HandlerError, HandlerOutcome, HandlerSource, Handlers,
};
