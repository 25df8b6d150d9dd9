//! Session tokens for traversal instances.
//!
//! A session identifies one logical traversal (one engine instance). Contexts
//! record which session currently holds an open frame so that two independent
//! traversals interleaving pushes to the same context can be detected and
//! reported as a hazard.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a traversal session.
///
/// Raw values start at 1; `0` is reserved as the "no holder" sentinel in a
/// context's holder cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new unique session ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw token value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}
