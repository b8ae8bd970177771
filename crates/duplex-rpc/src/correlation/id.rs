//! Request ID generation
//!
//! IDs only need to be unique for the lifetime of one connection. The
//! default generator is an atomic counter rendered as `"id-<n>"` strings;
//! callers may supply any function producing string or numeric IDs instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::protocol::RequestId;

/// Pluggable ID source; called once per outbound request
pub type IdGenerator = Arc<dyn Fn() -> RequestId + Send + Sync>;

/// Thread-safe sequential ID generator
///
/// # Examples
///
/// ```rust
/// use duplex_rpc::correlation::SequentialIdGenerator;
///
/// let generator = SequentialIdGenerator::new();
/// assert_eq!(generator.next_id().to_string(), "id-1");
/// assert_eq!(generator.next_id().to_string(), "id-2");
/// ```
#[derive(Debug)]
pub struct SequentialIdGenerator {
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Generate the next unique request ID
    pub fn next_id(&self) -> RequestId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        RequestId::new_string(format!("id-{n}"))
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// The default generator used when the connection options supply none
pub fn default_id_generator() -> IdGenerator {
    let generator = SequentialIdGenerator::new();
    Arc::new(move || generator.next_id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn generates_unique_ids_concurrently() {
        let generator = Arc::new(SequentialIdGenerator::new());
        let mut handles = vec![];

        for _ in 0..5 {
            let generator = Arc::clone(&generator);
            handles.push(thread::spawn(move || {
                (0..10).map(|_| generator.next_id()).collect::<Vec<_>>()
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 50);
    }

    #[test]
    fn default_generators_are_independent() {
        let a = default_id_generator();
        let b = default_id_generator();
        assert_eq!(a().to_string(), "id-1");
        assert_eq!(b().to_string(), "id-1");
        assert_eq!(a().to_string(), "id-2");
    }
}
