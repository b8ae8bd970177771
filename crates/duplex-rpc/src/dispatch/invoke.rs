//! Handler invocation
//!
//! Applies a user handler to a classified request or notification and maps
//! the outcome onto the wire: missing method → method-not-found, invalid
//! params → invalid-params with the diagnostic in `data`, other failures →
//! server-error, control outcomes → response first, then the shutdown
//! action. Notification failures never reach the wire; they go to the
//! notification error hook.

use std::sync::Arc;

use bson::Document;

use crate::peer::RpcContext;
use crate::protocol::message::id_to_bson;
use crate::protocol::{ErrorObject, InboundNotification, InboundRequest};

use super::handlers::{ControlAction, HandlerError, HandlerOutcome};

/// Run the request handler and build the response document.
///
/// Returns the response to send plus any shutdown action to execute after
/// the send completes.
pub(crate) async fn handle_request(
    ctx: &Arc<RpcContext>,
    request: InboundRequest,
) -> (Document, Option<ControlAction>) {
    let proto = ctx.protocol();
    let id = id_to_bson(&request.id);

    let handler = match ctx.request_handlers().get(&request.method) {
        Some(handler) => handler.clone(),
        None => {
            return (
                proto.failure(id, &ErrorObject::method_not_found()),
                None,
            )
        }
    };

    match handler(request.params).await {
        Ok(HandlerOutcome::Value(result)) => (proto.success(id, result), None),
        Ok(HandlerOutcome::Control { action, response }) => (
            proto.success(id, response.unwrap_or(bson::Bson::Null)),
            Some(action),
        ),
        Err(HandlerError::InvalidParams(detail)) => (
            proto.failure(id, &ErrorObject::invalid_params(detail)),
            None,
        ),
        Err(HandlerError::Failed(detail)) => (
            proto.failure(id, &ErrorObject::server_error(detail)),
            None,
        ),
        Err(HandlerError::NoHandler) => (
            proto.failure(id, &ErrorObject::method_not_found()),
            None,
        ),
    }
}

/// Run the notification handler.
///
/// No response is produced; failures go to the notification error hook and
/// control outcomes return the shutdown action.
pub(crate) async fn handle_notification(
    ctx: &Arc<RpcContext>,
    notification: InboundNotification,
) -> Option<ControlAction> {
    let handler = match ctx.notification_handlers().get(&notification.method) {
        Some(handler) => handler.clone(),
        None => {
            ctx.notification_error(&notification.method, &HandlerError::NoHandler);
            return None;
        }
    };

    match handler(notification.params).await {
        Ok(HandlerOutcome::Value(_)) => None,
        Ok(HandlerOutcome::Control { action, .. }) => Some(action),
        Err(err) => {
            ctx.notification_error(&notification.method, &err);
            None
        }
    }
}
