//! Protocol layer: message model and classification
//!
//! Messages are dynamic maps (`bson::Document`) with a configurable
//! protocol-tag key whose value must be `"2.0"`. [`Protocol`] builds
//! outbound documents and classifies inbound ones into the partition
//! defined by [`Inbound`].

pub mod classify;
pub mod constants;
pub mod message;

pub use classify::{Inbound, InboundNotification, InboundRequest, InboundResponse};
pub use constants::{error_codes, PROTOCOL_VERSION};
pub use message::{ErrorObject, Protocol, RequestId};
