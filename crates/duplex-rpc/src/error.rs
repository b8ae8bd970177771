//! Caller-visible request errors

use bson::Bson;

/// What an outbound request can come back with, other than a result
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RpcError {
    /// The peer answered with an error response
    #[error("peer error {code}: {message}")]
    Peer {
        /// Numeric error code from the peer
        code: i32,
        /// Error message from the peer
        message: String,
        /// The error object's `data`, when present
        data: Option<Bson>,
    },

    /// The connection closed before a response arrived
    #[error("connection closed")]
    ConnectionClosed,

    /// The outbound queue refused the send
    #[error("outbound buffer overflow")]
    BufferOverflow,

    /// The caller-supplied wait limit elapsed
    #[error("response timeout")]
    ResponseTimeout,

    /// The response matched neither the result nor the error shape
    ///
    /// Kept for API completeness; the classifier rejects such messages
    /// before they can reach a waiter.
    #[error("unrecognized response shape")]
    Unknown,
}
