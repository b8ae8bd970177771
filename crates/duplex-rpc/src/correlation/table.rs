//! Pending-response table
//!
//! One single-shot delivery slot per outstanding outbound request, keyed by
//! request ID. Slots are created on the send path, consumed by the
//! dispatcher when the correlated response arrives, removed by the caller
//! on a per-request timeout, and drained en masse when the connection goes
//! down so every waiter observes exactly one outcome.

use bson::Bson;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::trace;

use crate::protocol::{ErrorObject, RequestId};

/// What a waiter receives through its slot
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// The peer answered with `result`
    Result(Bson),
    /// The peer answered with `error`
    Error(ErrorObject),
    /// The connection went down before a response arrived
    Closed,
}

/// Table of pending-response slots for one connection
#[derive(Debug, Default)]
pub struct PendingTable {
    slots: DashMap<RequestId, oneshot::Sender<ResponseOutcome>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Allocate a slot for `id` and return the receiving end
    ///
    /// IDs are unique per connection by contract; a duplicate registration
    /// replaces the previous slot, whose waiter then observes `Closed`.
    pub fn register(&self, id: RequestId) -> oneshot::Receiver<ResponseOutcome> {
        let (sender, receiver) = oneshot::channel();
        self.slots.insert(id, sender);
        receiver
    }

    /// Deliver an outcome to the waiter for `id`, consuming the slot
    ///
    /// Returns `false` when no slot is registered under `id` (already
    /// completed, timed out, or never ours).
    pub fn deliver(&self, id: &RequestId, outcome: ResponseOutcome) -> bool {
        match self.slots.remove(id) {
            Some((_, sender)) => {
                // a dropped receiver means the waiter gave up; nothing to do
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Remove the slot for `id` without delivering anything
    ///
    /// Used by callers abandoning a request on timeout. Returns `true` when
    /// a slot was removed.
    pub fn forget(&self, id: &RequestId) -> bool {
        self.slots.remove(id).is_some()
    }

    /// Deliver `Closed` to every remaining waiter and empty the table
    pub fn drain_closed(&self) {
        let ids: Vec<RequestId> = self.slots.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, sender)) = self.slots.remove(&id) {
                trace!(%id, "delivering closed to pending waiter");
                let _ = sender.send(ResponseOutcome::Closed);
            }
        }
    }

    /// Number of outstanding slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
