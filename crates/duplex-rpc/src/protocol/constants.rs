//! Protocol Constants
//!
//! This module defines constants for the wire protocol: the protocol version,
//! the default protocol-tag keys, and the standardized JSON-RPC 2.0 error
//! codes, to ensure consistency and reduce typos.

/// Protocol version carried under the protocol-tag key of every message
pub const PROTOCOL_VERSION: &str = "2.0";

/// Default protocol-tag key names, derived from the codec in use
pub mod tags {
    /// Tag key for JSON connections
    pub const JSON: &str = "jsonrpc";
    /// Tag key for BSON connections
    pub const BSON: &str = "bsonrpc";
}

/// JSON-RPC 2.0 error codes
pub mod error_codes {
    /// Parse error - Invalid JSON/BSON was received by the peer
    pub const PARSE_ERROR: i32 = -32700;

    /// Invalid Request - The message is not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;

    /// Method not found - The method does not exist / is not available
    pub const METHOD_NOT_FOUND: i32 = -32601;

    /// Invalid params - Invalid method parameter(s)
    pub const INVALID_PARAMS: i32 = -32602;

    /// Internal error - Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Server error - Application-specific error
    pub const SERVER_ERROR: i32 = -32000;
}

/// Standard error messages paired with the codes above
pub mod error_messages {
    pub const PARSE_ERROR: &str = "Parse error";
    pub const INVALID_REQUEST: &str = "Invalid Request";
    pub const METHOD_NOT_FOUND: &str = "Method not found";
    pub const INVALID_PARAMS: &str = "Invalid params";
    pub const INTERNAL_ERROR: &str = "Internal error";
    pub const SERVER_ERROR: &str = "Server error";
}
