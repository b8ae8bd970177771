//! Connection entry points
//!
//! `connect_bson_rpc` / `connect_json_rpc` take a duplex byte stream the
//! caller has already established (TCP, TLS, an in-memory pipe; anything
//! `AsyncRead + AsyncWrite`), wire up the framing codec for the chosen
//! mode, and spawn the writer and dispatcher tasks. Both must be called
//! from within a tokio runtime.

use std::sync::Arc;

use bson::Document;
use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::correlation::default_id_generator;
use crate::dispatch::dispatcher;
use crate::dispatch::handlers::HandlerSource;
use crate::framing::FramingCodec;
use crate::protocol::{constants::tags, Protocol};

use super::options::{JsonFraming, Options};
use super::RpcContext;

/// Depth of the outbound document queue; a full queue rejects the put
const OUTBOUND_QUEUE: usize = 64;

/// Connect a BSON-RPC peer over `stream`
///
/// Frames are raw BSON documents back-to-back; the protocol tag defaults
/// to `"bsonrpc"`.
///
/// # Examples
///
/// ```rust
/// use duplex_rpc::peer::{connect_bson_rpc, Options};
/// use duplex_rpc::dispatch::handlers::HandlerSource;
///
/// # tokio_test::block_on(async {
/// let (stream, _peer) = tokio::io::duplex(4096);
/// let ctx = connect_bson_rpc(
///     stream,
///     HandlerSource::default(),
///     HandlerSource::default(),
///     Options::default(),
/// );
/// assert!(ctx.is_running());
/// ctx.close();
/// # });
/// ```
pub fn connect_bson_rpc<S>(
    stream: S,
    request_handlers: HandlerSource,
    notification_handlers: HandlerSource,
    options: Options,
) -> Arc<RpcContext>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let codec = FramingCodec::bson(options.max_len);
    connect(
        stream,
        codec,
        tags::BSON,
        request_handlers,
        notification_handlers,
        options,
    )
}

/// Connect a JSON-RPC 2.0 peer over `stream`
///
/// Framing follows `options.json_framing`: frameless by default, or RFC
/// 7464 text sequences. The protocol tag defaults to `"jsonrpc"`.
pub fn connect_json_rpc<S>(
    stream: S,
    request_handlers: HandlerSource,
    notification_handlers: HandlerSource,
    options: Options,
) -> Arc<RpcContext>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let codec = match options.json_framing {
        JsonFraming::Frameless => FramingCodec::json(options.json_key_fn.clone()),
        JsonFraming::Rfc7464 => {
            FramingCodec::json_records(options.max_len, options.json_key_fn.clone())
        }
    };
    connect(
        stream,
        codec,
        tags::JSON,
        request_handlers,
        notification_handlers,
        options,
    )
}

fn connect<S>(
    stream: S,
    codec: FramingCodec,
    default_tag: &str,
    request_handlers: HandlerSource,
    notification_handlers: HandlerSource,
    options: Options,
) -> Arc<RpcContext>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let tag = options
        .protocol_keyword
        .clone()
        .unwrap_or_else(|| default_tag.to_string());
    let connection_id = options
        .connection_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let id_generator = options
        .id_generator
        .clone()
        .unwrap_or_else(default_id_generator);

    let (read_half, write_half) = tokio::io::split(stream);
    let (outbound_tx, outbound_rx) = mpsc::channel::<Document>(OUTBOUND_QUEUE);

    let ctx = Arc::new(RpcContext::new(
        connection_id,
        Protocol::new(tag),
        options,
        id_generator,
        outbound_tx,
    ));
    debug!(connection_id = ctx.connection_id(), "connection established");

    // factories run now so handlers can capture the context
    ctx.install_handlers(
        request_handlers.build(&ctx),
        notification_handlers.build(&ctx),
    );

    tokio::spawn(write_loop(
        FramedWrite::new(write_half, codec.clone()),
        outbound_rx,
        ctx.shutdown_token().clone(),
        ctx.connection_id().to_string(),
    ));
    tokio::spawn(dispatcher::run(
        Arc::clone(&ctx),
        FramedRead::new(read_half, codec),
    ));

    ctx
}

/// Writer task: encode queued documents onto the write half.
///
/// On shutdown, documents already queued are still flushed (a control
/// response must reach the wire before the connection drops), then the
/// write half is shut down so the peer observes EOF.
async fn write_loop<W>(
    mut framed: FramedWrite<W, FramingCodec>,
    mut outbound: mpsc::Receiver<Document>,
    shutdown: CancellationToken,
    connection_id: String,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            doc = outbound.recv() => match doc {
                None => break,
                Some(doc) => {
                    if let Err(e) = framed.send(doc).await {
                        warn!(
                            connection_id = %connection_id,
                            error = %e,
                            "write failed, closing connection"
                        );
                        shutdown.cancel();
                        break;
                    }
                }
            },
        }
    }

    // drain what was queued before the shutdown signal
    while let Ok(doc) = outbound.try_recv() {
        if framed.send(doc).await.is_err() {
            break;
        }
    }

    outbound.close();
    let _ = framed.get_mut().shutdown().await;
    debug!(connection_id = %connection_id, "writer stopped");
}
