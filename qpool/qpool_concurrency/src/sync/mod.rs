//! Synchronization primitives for queue selection.
//!
//! - Atomic round-robin cursor used to spread acquisitions over a pool

pub mod atomic;

pub use atomic::RoundRobinCursor;
