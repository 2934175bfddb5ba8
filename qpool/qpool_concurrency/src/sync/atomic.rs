//! Atomic operations and data structures.
//!
//! Provides the wait-free cursor behind round-robin slot selection.

use std::sync::atomic::{AtomicUsize, Ordering};

/// A counter that hands out positions `0, 1, .., capacity - 1, 0, ..`.
///
/// Each call to [`next`](Self::next) is a single `fetch_add`, so concurrent
/// callers never block or retry. Which caller receives which position is up
/// to the interleaving; every call advances the cursor exactly once.
#[derive(Debug)]
pub struct RoundRobinCursor {
    /// Monotonic count of positions handed out
    value: AtomicUsize,

    /// Number of distinct positions
    capacity: usize,
}

impl RoundRobinCursor {
    /// Create a cursor over `capacity` positions, starting at 0.
    ///
    /// A zero capacity is treated as 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            value: AtomicUsize::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Take the next position.
    pub fn next(&self) -> usize {
        self.value.fetch_add(1, Ordering::Relaxed) % self.capacity
    }

    /// Position the next call will return, without advancing.
    pub fn peek(&self) -> usize {
        self.value.load(Ordering::Relaxed) % self.capacity
    }

    /// Number of distinct positions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
