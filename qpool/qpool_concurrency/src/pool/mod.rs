//! Pooled device queues.
//!
//! This module provides the pooling layer:
//!
//! - Device pools holding lazily-constructed native queues per priority class
//! - The registry holding one pool pair per known device

pub mod device;
pub mod registry;

// Re-export key types from device
pub use device::DevicePool;

// Re-export key types from registry
pub use registry::PoolRegistry;
