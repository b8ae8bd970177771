//! Connection context
//!
//! One [`RpcContext`] per live connection: the configuration snapshot, the
//! handler tables, the pending-response table, the outbound queue, and the
//! run flag. The context is shared (`Arc`) between the dispatcher task, the
//! writer task, spawned handler subtasks, and API callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use bson::{Bson, Document};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::correlation::{IdGenerator, PendingTable, ResponseOutcome};
use crate::dispatch::handlers::{HandlerError, Handlers};
use crate::error::RpcError;
use crate::protocol::{ErrorObject, Protocol, RequestId};

use super::options::Options;

/// A live RPC connection
///
/// Created by [`connect_bson_rpc`](super::connect_bson_rpc) /
/// [`connect_json_rpc`](super::connect_json_rpc). Symmetric: the same type
/// serves callers and callees, and both sides may issue requests at any
/// time.
pub struct RpcContext {
    connection_id: String,
    protocol: Protocol,
    options: Options,
    request_handlers: OnceLock<Handlers>,
    notification_handlers: OnceLock<Handlers>,
    pending: PendingTable,
    id_generator: IdGenerator,
    outbound: mpsc::Sender<Document>,
    running: AtomicBool,
    shutdown: CancellationToken,
}

impl RpcContext {
    pub(super) fn new(
        connection_id: String,
        protocol: Protocol,
        options: Options,
        id_generator: IdGenerator,
        outbound: mpsc::Sender<Document>,
    ) -> Self {
        Self {
            connection_id,
            protocol,
            options,
            request_handlers: OnceLock::new(),
            notification_handlers: OnceLock::new(),
            pending: PendingTable::new(),
            id_generator,
            outbound,
            running: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
        }
    }

    pub(crate) fn install_handlers(&self, requests: Handlers, notifications: Handlers) {
        let _ = self.request_handlers.set(requests);
        let _ = self.notification_handlers.set(notifications);
    }

    /// Identifier for this connection, as used in log events
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Whether the connection is still dispatching
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of outbound requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Call `method` on the peer and wait for the correlated response
    ///
    /// # Errors
    ///
    /// - [`RpcError::Peer`] when the peer answers with an error response
    /// - [`RpcError::ConnectionClosed`] when the connection goes down first
    /// - [`RpcError::BufferOverflow`] when the outbound queue rejects the send
    pub async fn request(&self, method: &str, params: Vec<Bson>) -> Result<Bson, RpcError> {
        self.request_inner(None, method, params).await
    }

    /// Like [`request`](Self::request), giving up after `limit`
    ///
    /// On timeout the pending slot is removed, so a response arriving later
    /// is routed to the invalid-id hook instead of a vanished waiter.
    ///
    /// # Errors
    ///
    /// The [`request`](Self::request) outcomes plus [`RpcError::ResponseTimeout`].
    pub async fn request_with_timeout(
        &self,
        limit: Duration,
        method: &str,
        params: Vec<Bson>,
    ) -> Result<Bson, RpcError> {
        self.request_inner(Some(limit), method, params).await
    }

    async fn request_inner(
        &self,
        limit: Option<Duration>,
        method: &str,
        params: Vec<Bson>,
    ) -> Result<Bson, RpcError> {
        if !self.is_running() {
            return Err(RpcError::ConnectionClosed);
        }

        let id = (self.id_generator)();
        let receiver = self.pending.register(id.clone());
        // teardown drains the table after clearing the run flag; a slot
        // registered concurrently must not outlive that drain
        if !self.is_running() {
            self.pending.forget(&id);
            return Err(RpcError::ConnectionClosed);
        }
        let request = self.protocol.request(method, params, &id);

        if let Err(refused) = self.outbound.try_send(request) {
            self.pending.forget(&id);
            return Err(match refused {
                TrySendError::Full(_) => RpcError::BufferOverflow,
                TrySendError::Closed(_) => RpcError::ConnectionClosed,
            });
        }
        debug!(
            connection_id = self.connection_id(),
            %id,
            method,
            "request sent"
        );

        let outcome = match limit {
            None => receiver.await,
            Some(limit) => match timeout(limit, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.forget(&id);
                    return Err(RpcError::ResponseTimeout);
                }
            },
        };

        match outcome {
            Ok(ResponseOutcome::Result(value)) => Ok(value),
            Ok(ResponseOutcome::Error(error)) => Err(RpcError::Peer {
                code: error.code,
                message: error.message,
                data: error.data,
            }),
            // a dropped sender is teardown racing the waiter
            Ok(ResponseOutcome::Closed) | Err(_) => Err(RpcError::ConnectionClosed),
        }
    }

    /// Fire-and-forget notification; returns whether the single put onto
    /// the outbound queue succeeded
    pub fn notify(&self, method: &str, params: Vec<Bson>) -> bool {
        if !self.is_running() {
            return false;
        }
        self.outbound
            .try_send(self.protocol.notification(method, params))
            .is_ok()
    }

    /// Close the connection
    ///
    /// Idempotent. Cancels the dispatcher and writer tasks; every pending
    /// waiter receives the closed outcome during teardown.
    pub fn close(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!(connection_id = self.connection_id(), "closing connection");
        }
        self.shutdown.cancel();
    }

    // engine-side accessors

    pub(crate) fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub(crate) fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn idle_timeout(&self) -> Option<Duration> {
        self.options.idle_timeout
    }

    pub(crate) fn async_request_handling(&self) -> bool {
        self.options.async_request_handling
    }

    pub(crate) fn async_notification_handling(&self) -> bool {
        self.options.async_notification_handling
    }

    pub(crate) fn request_handlers(&self) -> &Handlers {
        static EMPTY: OnceLock<Handlers> = OnceLock::new();
        self.request_handlers
            .get()
            .unwrap_or_else(|| EMPTY.get_or_init(Handlers::new))
    }

    pub(crate) fn notification_handlers(&self) -> &Handlers {
        static EMPTY: OnceLock<Handlers> = OnceLock::new();
        self.notification_handlers
            .get()
            .unwrap_or_else(|| EMPTY.get_or_init(Handlers::new))
    }

    /// Queue a document for the writer task, waiting for capacity.
    ///
    /// Returns `false` when the writer is gone; the dispatcher treats that
    /// as a rejected put and closes the connection.
    pub(crate) async fn send_outbound(&self, doc: Document) -> bool {
        self.outbound.send(doc).await.is_ok()
    }

    pub(crate) fn mark_closed(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
    }

    // hook invocation, falling back to engine defaults

    pub(crate) fn connection_closed(&self) {
        if let Some(hook) = &self.options.connection_closed_handler {
            hook(self);
        }
    }

    /// Invoke the idle-timeout hook. Returns `true` when a custom hook ran
    /// (the loop continues; the hook decides whether to close).
    pub(crate) fn idle_timeout_hook(&self) -> bool {
        match &self.options.idle_timeout_handler {
            Some(hook) => {
                hook(self);
                true
            }
            None => false,
        }
    }

    pub(crate) fn invalid_id_response(&self, id: &RequestId) {
        match &self.options.invalid_id_response_handler {
            Some(hook) => hook(self, id),
            None => warn!(
                connection_id = self.connection_id(),
                %id,
                "response for unknown request id"
            ),
        }
    }

    pub(crate) fn nil_id_error(&self, error: &ErrorObject) {
        match &self.options.nil_id_error_handler {
            Some(hook) => hook(self, error),
            None => error!(
                connection_id = self.connection_id(),
                code = error.code,
                message = %error.message,
                "peer reported an uncorrelated error"
            ),
        }
    }

    pub(crate) fn notification_error(&self, method: &str, err: &HandlerError) {
        match &self.options.notification_error_handler {
            Some(hook) => hook(self, method, err),
            None => warn!(
                connection_id = self.connection_id(),
                method,
                error = %err,
                "notification handler error"
            ),
        }
    }

    pub(crate) fn close_server(&self) {
        match &self.options.server {
            Some(close) => {
                debug!(connection_id = self.connection_id(), "closing server");
                close();
            }
            None => warn!(
                connection_id = self.connection_id(),
                "close_server requested but no server handle is configured"
            ),
        }
    }
}

impl std::fmt::Debug for RpcContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcContext")
            .field("connection_id", &self.connection_id)
            .field("protocol_tag", &self.protocol.tag())
            .field("running", &self.is_running())
            .field("pending", &self.pending.len())
            .finish()
    }
}
