//! Inbound dispatcher
//!
//! One cooperative task per connection consumes the framed decoder output
//! sequentially. Requests and notifications are applied to user handlers
//! (inline or on spawned subtasks per the connection options), responses
//! are correlated with pending waiters, and parse errors follow the
//! per-mode recovery policy. The loop exits on peer drain, idle timeout,
//! a fatal parse error, handler-requested shutdown, or `close()`; teardown
//! then drains every pending waiter with the closed sentinel.

use std::io;
use std::sync::Arc;

use bson::Bson;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::time::timeout;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use crate::framing::{Frame, FrameError, FramingCodec, Severity};
use crate::peer::RpcContext;
use crate::protocol::{ErrorObject, Inbound};

use super::handlers::ControlAction;
use super::invoke;

/// One step of the dispatch loop
enum Step {
    Frame(Frame),
    Drained,
    IoError(io::Error),
    IdleTimeout,
    Shutdown,
}

fn step_from(item: Option<Result<Frame, io::Error>>) -> Step {
    match item {
        None => Step::Drained,
        Some(Ok(frame)) => Step::Frame(frame),
        Some(Err(e)) => Step::IoError(e),
    }
}

async fn next_step<R>(ctx: &Arc<RpcContext>, framed: &mut FramedRead<R, FramingCodec>) -> Step
where
    R: AsyncRead + Unpin,
{
    let read = async {
        match ctx.idle_timeout() {
            Some(limit) => match timeout(limit, framed.next()).await {
                Err(_) => Step::IdleTimeout,
                Ok(item) => step_from(item),
            },
            None => step_from(framed.next().await),
        }
    };

    tokio::select! {
        _ = ctx.shutdown_token().cancelled() => Step::Shutdown,
        step = read => step,
    }
}

/// Run the dispatch loop to completion, then tear the connection down
pub(crate) async fn run<R>(ctx: Arc<RpcContext>, mut framed: FramedRead<R, FramingCodec>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    debug!(connection_id = ctx.connection_id(), "dispatcher started");

    loop {
        match next_step(&ctx, &mut framed).await {
            Step::Shutdown => {
                debug!(connection_id = ctx.connection_id(), "dispatcher shut down");
                break;
            }
            Step::Drained => {
                debug!(connection_id = ctx.connection_id(), "peer closed the stream");
                ctx.connection_closed();
                break;
            }
            Step::IoError(e) => {
                warn!(
                    connection_id = ctx.connection_id(),
                    error = %e,
                    "read failed, closing connection"
                );
                ctx.connection_closed();
                break;
            }
            Step::IdleTimeout => {
                if ctx.idle_timeout_hook() {
                    continue;
                }
                debug!(
                    connection_id = ctx.connection_id(),
                    "idle timeout, closing connection"
                );
                break;
            }
            Step::Frame(Frame::Error(parse_error)) => {
                if !on_parse_error(&ctx, parse_error).await {
                    break;
                }
            }
            Step::Frame(Frame::Message(doc)) => {
                if !on_message(&ctx, doc).await {
                    break;
                }
            }
        }
    }

    ctx.mark_closed();
    ctx.pending().drain_closed();
    debug!(connection_id = ctx.connection_id(), "dispatcher stopped");
}

/// Apply the per-mode recovery policy to a parse error.
///
/// Returns whether the loop should keep running.
async fn on_parse_error(ctx: &Arc<RpcContext>, parse_error: FrameError) -> bool {
    match parse_error.severity {
        Severity::Warn => {
            warn!(
                connection_id = ctx.connection_id(),
                kind = %parse_error.kind,
                detail = %parse_error.detail,
                "ignoring parse error at end of stream"
            );
            true
        }
        Severity::Recoverable => {
            warn!(
                connection_id = ctx.connection_id(),
                kind = %parse_error.kind,
                detail = %parse_error.detail,
                "recoverable parse error"
            );
            send_parse_error_reply(ctx, &parse_error).await
        }
        Severity::Fatal => {
            warn!(
                connection_id = ctx.connection_id(),
                kind = %parse_error.kind,
                detail = %parse_error.detail,
                "fatal parse error, closing connection"
            );
            send_parse_error_reply(ctx, &parse_error).await;
            false
        }
    }
}

async fn send_parse_error_reply(ctx: &Arc<RpcContext>, parse_error: &FrameError) -> bool {
    let error = ErrorObject::parse_error(format!("{parse_error}"));
    let reply = ctx.protocol().failure(Bson::Null, &error);
    ctx.send_outbound(reply).await
}

/// Route one classified message. Returns whether the loop should keep running.
async fn on_message(ctx: &Arc<RpcContext>, doc: bson::Document) -> bool {
    match ctx.protocol().classify(doc) {
        Inbound::Request(request) => {
            if ctx.async_request_handling() {
                let ctx = Arc::clone(ctx);
                tokio::spawn(async move {
                    if !respond_to_request(&ctx, request).await {
                        ctx.close();
                    }
                });
                true
            } else {
                respond_to_request(ctx, request).await
            }
        }
        Inbound::Notification(notification) => {
            if ctx.async_notification_handling() {
                let ctx = Arc::clone(ctx);
                tokio::spawn(async move {
                    if !run_notification(&ctx, notification).await {
                        ctx.close();
                    }
                });
                true
            } else {
                run_notification(ctx, notification).await
            }
        }
        Inbound::Response(response) => {
            let outcome = match response.outcome {
                Ok(result) => crate::correlation::ResponseOutcome::Result(result),
                Err(error) => crate::correlation::ResponseOutcome::Error(error),
            };
            if !ctx.pending().deliver(&response.id, outcome) {
                ctx.invalid_id_response(&response.id);
            }
            true
        }
        Inbound::NilIdError(error) => {
            ctx.nil_id_error(&error);
            true
        }
        Inbound::SchemaError(doc) => on_schema_error(ctx, doc).await,
    }
}

/// Invoke the request handler and put the response on the wire.
///
/// Returns whether the connection should keep running (a rejected send or
/// a close-connection control action stops it).
async fn respond_to_request(ctx: &Arc<RpcContext>, request: crate::protocol::InboundRequest) -> bool {
    let (response, action) = invoke::handle_request(ctx, request).await;
    if !ctx.send_outbound(response).await {
        return false;
    }
    match action {
        None => true,
        Some(action) => execute_control(ctx, action),
    }
}

async fn run_notification(
    ctx: &Arc<RpcContext>,
    notification: crate::protocol::InboundNotification,
) -> bool {
    match invoke::handle_notification(ctx, notification).await {
        None => true,
        Some(action) => execute_control(ctx, action),
    }
}

/// Execute a handler-requested shutdown. Returns whether this connection
/// keeps running.
fn execute_control(ctx: &Arc<RpcContext>, action: ControlAction) -> bool {
    match action {
        ControlAction::CloseConnection => false,
        ControlAction::CloseServer => {
            ctx.close_server();
            true
        }
        ControlAction::CloseConnectionAndServer => {
            ctx.close_server();
            false
        }
    }
}

/// A message that satisfied no predicate. Malformed requests (anything with
/// a `method`) get an invalid-request reply carrying the offending id.
async fn on_schema_error(ctx: &Arc<RpcContext>, doc: bson::Document) -> bool {
    warn!(
        connection_id = ctx.connection_id(),
        message = %doc,
        "message failed schema validation"
    );

    if doc.contains_key("method") {
        let id = match doc.get("id") {
            Some(id @ (Bson::String(_) | Bson::Int32(_) | Bson::Int64(_))) => id.clone(),
            _ => Bson::Null,
        };
        let error = ErrorObject::invalid_request(Bson::Document(doc));
        let reply = ctx.protocol().failure(id, &error);
        return ctx.send_outbound(reply).await;
    }
    true
}
