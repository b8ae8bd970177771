//! Handler tables and handler outcomes
//!
//! User handlers receive the request's positional parameters and return
//! either a value or a control outcome asking the engine to shut down the
//! connection, the server, or both, after any response has been sent.
//! Handler tables can be built statically or from a factory closure that
//! receives the connection context, letting handlers call back to the peer.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bson::Bson;
use futures::future::BoxFuture;

use crate::peer::RpcContext;

/// Shutdown requested by a handler, executed after the response is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Close this connection
    CloseConnection,
    /// Close the accepting server, leaving this connection up
    CloseServer,
    /// Close both
    CloseConnectionAndServer,
}

/// What a handler produced: a plain value, or a value plus a shutdown request
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// Ordinary return value, sent as the response `result`
    Value(Bson),
    /// Shutdown request; `response` (defaulting to null) is sent as the
    /// response `result` first when invoked from a request context
    Control {
        action: ControlAction,
        response: Option<Bson>,
    },
}

impl HandlerOutcome {
    /// Ordinary success value
    pub fn value(v: impl Into<Bson>) -> Self {
        HandlerOutcome::Value(v.into())
    }

    /// Respond (optionally) and close this connection
    pub fn close_connection(response: Option<Bson>) -> Self {
        HandlerOutcome::Control {
            action: ControlAction::CloseConnection,
            response,
        }
    }

    /// Respond (optionally) and close the server
    pub fn close_server(response: Option<Bson>) -> Self {
        HandlerOutcome::Control {
            action: ControlAction::CloseServer,
            response,
        }
    }

    /// Respond (optionally) and close both connection and server
    pub fn close_connection_and_server(response: Option<Bson>) -> Self {
        HandlerOutcome::Control {
            action: ControlAction::CloseConnectionAndServer,
            response,
        }
    }
}

/// Errors a handler can produce
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    /// Parameters did not match what the method expects; becomes an
    /// invalid-params response with the diagnostic in `data`
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The handler failed; becomes a server-error response with the
    /// diagnostic in `data`
    #[error("{0}")]
    Failed(String),

    /// No handler is registered for the method (engine-generated, seen by
    /// the notification error hook)
    #[error("no handler registered for method")]
    NoHandler,
}

impl HandlerError {
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        HandlerError::InvalidParams(detail.into())
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        HandlerError::Failed(detail.into())
    }
}

/// Boxed handler future
pub type HandlerFuture = BoxFuture<'static, Result<HandlerOutcome, HandlerError>>;

/// A registered method handler over positional parameters
pub type Handler = Arc<dyn Fn(Vec<Bson>) -> HandlerFuture + Send + Sync>;

/// Method-name → handler table
///
/// # Examples
///
/// ```rust
/// use duplex_rpc::dispatch::handlers::{params, HandlerOutcome, Handlers};
///
/// let mut handlers = Handlers::new();
/// handlers.register("echo", |args| async move {
///     let [s] = params::arity(args)?;
///     Ok(HandlerOutcome::Value(s))
/// });
/// assert!(handlers.get("echo").is_some());
/// ```
#[derive(Clone, Default)]
pub struct Handlers {
    map: HashMap<String, Handler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Register a handler closure under a method name
    pub fn register<F, Fut>(&mut self, method: impl Into<String>, f: F)
    where
        F: Fn(Vec<Bson>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerOutcome, HandlerError>> + Send + 'static,
    {
        self.map
            .insert(method.into(), Arc::new(move |args| Box::pin(f(args))));
    }

    /// Look up the handler for a method
    pub fn get(&self, method: &str) -> Option<&Handler> {
        self.map.get(method)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A handler table, or a factory producing one from the connection context
///
/// The factory form runs once during connection setup, so handlers can
/// capture the context and issue peer callbacks from inside a handler.
pub enum HandlerSource {
    Static(Handlers),
    WithContext(Box<dyn FnOnce(&Arc<RpcContext>) -> Handlers + Send>),
}

impl Default for HandlerSource {
    fn default() -> Self {
        HandlerSource::Static(Handlers::new())
    }
}

impl From<Handlers> for HandlerSource {
    fn from(handlers: Handlers) -> Self {
        HandlerSource::Static(handlers)
    }
}

impl HandlerSource {
    /// Factory form: build the table with access to the connection context
    pub fn with_context<F>(f: F) -> Self
    where
        F: FnOnce(&Arc<RpcContext>) -> Handlers + Send + 'static,
    {
        HandlerSource::WithContext(Box::new(f))
    }

    pub(crate) fn build(self, ctx: &Arc<RpcContext>) -> Handlers {
        match self {
            HandlerSource::Static(handlers) => handlers,
            HandlerSource::WithContext(f) => f(ctx),
        }
    }
}

/// Positional-parameter helpers for handler bodies
pub mod params {
    use super::HandlerError;
    use bson::Bson;

    /// Require exactly `N` positional parameters
    ///
    /// The error text names the mismatch, which ends up in the
    /// invalid-params response's `data`.
    pub fn arity<const N: usize>(args: Vec<Bson>) -> Result<[Bson; N], HandlerError> {
        let got = args.len();
        <[Bson; N]>::try_from(args).map_err(|_| {
            HandlerError::InvalidParams(format!("expected {} parameter(s), got {}", N, got))
        })
    }

    /// Require a string parameter, with the parameter name in diagnostics
    pub fn string(value: &Bson, name: &str) -> Result<String, HandlerError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| HandlerError::InvalidParams(format!("parameter '{name}' must be a string")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registered_handler_is_invocable() {
        let mut handlers = Handlers::new();
        handlers.register("double", |args| async move {
            let [n] = params::arity(args)?;
            let n = n.as_i64().ok_or_else(|| HandlerError::invalid_params("not an integer"))?;
            Ok(HandlerOutcome::Value(Bson::Int64(n * 2)))
        });

        let handler = handlers.get("double").unwrap();
        let outcome = handler(vec![Bson::Int64(21)]).await.unwrap();
        assert_eq!(outcome, HandlerOutcome::Value(Bson::Int64(42)));
    }

    #[tokio::test]
    async fn arity_mismatch_names_counts() {
        let err = params::arity::<1>(vec![Bson::Int64(1), Bson::Int64(2)]).unwrap_err();
        match err {
            HandlerError::InvalidParams(detail) => {
                assert!(detail.contains("expected 1"));
                assert!(detail.contains("got 2"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn control_constructors_carry_responses() {
        match HandlerOutcome::close_connection(Some(Bson::from("ack!"))) {
            HandlerOutcome::Control { action, response } => {
                assert_eq!(action, ControlAction::CloseConnection);
                assert_eq!(response, Some(Bson::String("ack!".into())));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
