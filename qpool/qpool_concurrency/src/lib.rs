#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # qpool concurrency
//!
//! Pooled accelerator queues shared by concurrent host threads.
//!
//! This crate provides:
//!
//! - Per-device, per-priority pools of lazily-constructed native queues
//!   handed out round-robin
//! - A per-thread "current queue" for each device, with scoped guards
//! - Completion queries, synchronization and priority lookups
//! - A process-wide manager for device-agnostic consumers
//!
//! ## Steady-state cost
//!
//! After a slot's native queue exists, acquiring it is one atomic increment
//! and one initialized-cell read. Reading or installing the current queue
//! touches thread-local state only.

/// Per-thread current queue tables
pub mod current;

/// Process-wide manager and free-function accessors
pub mod global;

/// Scoped current-queue and active-device guards
pub mod guard;

/// Query, synchronize and priority operations
mod lifecycle;

/// The queue manager tying runtime, pools and current queues together
pub mod manager;

/// Pooled device queues and the pool registry
pub mod pool;

/// Synchronization primitives for slot selection
pub mod sync;

// Re-export key types for easier access
pub use current::CurrentQueueRegistry;
pub use guard::{DeviceGuard, ScopedQueueGuard};
pub use manager::QueueManager;
pub use pool::{DevicePool, PoolRegistry};
pub use sync::RoundRobinCursor;
