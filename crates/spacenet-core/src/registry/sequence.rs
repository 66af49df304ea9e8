//! Thread-safe allocator for input correlation ids.
//!
//! # Why ids instead of pointers? (for beginners)
//!
//! An input request is answered later, possibly from another thread, by a
//! front-end that only knows the number it was given.  If that number were a
//! pointer to the waiting continuation, a late or duplicated answer could
//! touch freed memory.  A plain integer that is looked up in a map can at
//! worst miss, and a miss is simply ignored.
//!
//! For the lookup to be safe the same integer must never name two different
//! requests, so ids only ever increase.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::dialog::RequestId;

/// Monotonic allocator for [`RequestId`]s.
///
/// The first id handed out is `1`; `0` is reserved as the null id.  With 64
/// bits the counter cannot realistically wrap within a process lifetime.
pub struct RequestIdAllocator {
    next: AtomicU64,
}

impl RequestIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns a fresh id.
    ///
    /// `Relaxed` is enough: uniqueness comes from the atomic read-modify-write
    /// itself, and the id is published to other threads through the broker's
    /// mutex, which provides the ordering.
    pub fn next(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
