//! Correlation layer: outbound request tracking
//!
//! Matches inbound responses to the callers waiting on them. The send path
//! allocates a one-shot slot in the [`PendingTable`] under a fresh request
//! ID; the dispatcher delivers the correlated outcome; connection teardown
//! drains every remaining slot with `Closed`.

pub mod id;
pub mod table;

pub use id::{default_id_generator, IdGenerator, SequentialIdGenerator};
pub use table::{PendingTable, ResponseOutcome};
