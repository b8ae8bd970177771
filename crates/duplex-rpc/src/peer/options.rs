//! Connection options
//!
//! A plain configuration snapshot taken at connect time. Every field has a
//! default; hooks default to `None`, which means the engine's own behavior
//! (usually a `tracing` log line, for the timeout hooks a connection close).

use std::sync::Arc;
use std::time::Duration;

use crate::codec::KeyFn;
use crate::correlation::IdGenerator;
use crate::dispatch::handlers::HandlerError;
use crate::protocol::{ErrorObject, RequestId};

use super::RpcContext;

/// Hook invoked with the connection context (peer close, idle timeout)
pub type ConnectionHook = Arc<dyn Fn(&RpcContext) + Send + Sync>;

/// Hook invoked when a response arrives for an unknown request id
pub type InvalidIdResponseHook = Arc<dyn Fn(&RpcContext, &RequestId) + Send + Sync>;

/// Hook invoked when the peer reports an error with a null id
pub type NilIdErrorHook = Arc<dyn Fn(&RpcContext, &ErrorObject) + Send + Sync>;

/// Hook invoked when a notification handler is missing or fails
pub type NotificationErrorHook = Arc<dyn Fn(&RpcContext, &str, &HandlerError) + Send + Sync>;

/// Closeable handle for `close_server` control outcomes
pub type ServerCloser = Arc<dyn Fn() + Send + Sync>;

/// Framing mode for JSON connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFraming {
    /// Concatenated JSON values, boundaries found by the streaming scanner
    #[default]
    Frameless,
    /// RFC 7464 text sequences: `0x1E` + JSON + `0x0A`
    Rfc7464,
}

/// Per-connection configuration
///
/// # Examples
///
/// ```rust
/// use duplex_rpc::peer::Options;
/// use std::time::Duration;
///
/// let options = Options {
///     idle_timeout: Some(Duration::from_secs(120)),
///     ..Default::default()
/// };
/// assert!(options.async_request_handling);
/// assert!(!options.async_notification_handling);
/// ```
#[derive(Clone)]
pub struct Options {
    /// Run notification handlers on spawned subtasks. The default (false)
    /// preserves strict arrival-order execution.
    pub async_notification_handling: bool,

    /// Run request handlers on spawned subtasks; responses go out in
    /// handler-completion order. Default true.
    pub async_request_handling: bool,

    /// Invoked when the peer closes the stream, before teardown
    pub connection_closed_handler: Option<ConnectionHook>,

    /// Connection identifier for logs; generated (UUID v4) when absent
    pub connection_id: Option<String>,

    /// Outbound request id source; defaults to a per-connection counter
    /// rendered as `"id-<n>"`
    pub id_generator: Option<IdGenerator>,

    /// Close the connection after this long with no inbound traffic
    pub idle_timeout: Option<Duration>,

    /// Invoked on idle timeout instead of the default close-and-exit; the
    /// hook may call `close()` itself to end the connection
    pub idle_timeout_handler: Option<ConnectionHook>,

    /// Invoked when a response carries an id with no pending waiter
    pub invalid_id_response_handler: Option<InvalidIdResponseHook>,

    /// Framing mode for JSON connections (ignored for BSON)
    pub json_framing: JsonFraming,

    /// Transform applied to decoded JSON object keys
    pub json_key_fn: Option<KeyFn>,

    /// Maximum frame/record length; ignored for frameless JSON
    pub max_len: i32,

    /// Invoked when the peer reports an error response with a null id
    pub nil_id_error_handler: Option<NilIdErrorHook>,

    /// Invoked when a notification handler is missing or fails
    pub notification_error_handler: Option<NotificationErrorHook>,

    /// Protocol-tag key; defaults to `"jsonrpc"` / `"bsonrpc"` per codec
    pub protocol_keyword: Option<String>,

    /// Handle closed by `close_server` control outcomes
    pub server: Option<ServerCloser>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            async_notification_handling: false,
            async_request_handling: true,
            connection_closed_handler: None,
            connection_id: None,
            id_generator: None,
            idle_timeout: None,
            idle_timeout_handler: None,
            invalid_id_response_handler: None,
            json_framing: JsonFraming::default(),
            json_key_fn: None,
            max_len: i32::MAX,
            nil_id_error_handler: None,
            notification_error_handler: None,
            protocol_keyword: None,
            server: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_policy() {
        let options = Options::default();
        assert!(!options.async_notification_handling);
        assert!(options.async_request_handling);
        assert_eq!(options.json_framing, JsonFraming::Frameless);
        assert_eq!(options.max_len, i32::MAX);
        assert!(options.idle_timeout.is_none());
        assert!(options.connection_id.is_none());
    }
}
