//! Error types for the qpool system.
//!
//! Queue failures fall into two classes. Precondition violations (an unknown
//! device index, a packed reference of the wrong kind, a queue identity the
//! registry has never constructed) are caller bugs. Device faults are
//! non-success statuses reported by the accelerator runtime; the state of the
//! affected queue is unknown afterwards, so they are never retried here.
//!
//! "Not ready" from a non-blocking query is not an error at all and never
//! appears in these types.

use thiserror::Error;

use crate::device::{DeviceIndex, DeviceKind};
use crate::handle::QueueHandle;

/// Root error type for qpool.
#[derive(Debug, Error)]
pub enum Error {
    /// Queue pool, handle and lifecycle errors
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by queue acquisition, lookup and lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The device index does not name a device known to the process
    #[error("Invalid device index {device}: {count} device(s) known")]
    InvalidDevice {
        /// The offending index
        device: DeviceIndex,
        /// Number of known devices
        count: DeviceIndex,
    },

    /// A packed reference carried a raw device kind that does not exist
    #[error("Unknown device kind tag {0}")]
    UnknownDeviceKind(i8),

    /// A packed reference named a device kind that qpool does not manage
    #[error("Expected an accelerator queue, got a {0} queue")]
    WrongDeviceKind(DeviceKind),

    /// The handle names a pooled slot that was never constructed
    #[error("Queue {0} is not known to the pool registry")]
    UnknownQueue(QueueHandle),

    /// An external native handle uses the bit reserved for marking external queues
    #[error("External queue handle {0:#x} does not fit in 63 bits")]
    ExternalHandleOutOfRange(u64),

    /// The accelerator runtime reported a fault
    #[error("{operation} failed on device {device} with runtime status {code}")]
    DeviceFault {
        /// Name of the failing operation
        operation: &'static str,
        /// Device the operation targeted
        device: DeviceIndex,
        /// Native status code
        code: i32,
    },

    /// The runtime reported a native priority range outside the expected convention
    #[error("Unexpected native queue priority range [least={least}, greatest={greatest}]")]
    PriorityRange {
        /// Numerically least-urgent native priority
        least: i32,
        /// Numerically most-urgent native priority
        greatest: i32,
    },

    /// No process-wide queue manager has been installed yet
    #[error("No queue manager has been installed")]
    NotInstalled,

    /// A process-wide queue manager is already installed
    #[error("A queue manager is already installed")]
    AlreadyInstalled,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration source could not be read
    #[error("Failed to load configuration: {0}")]
    LoadFailed(#[from] std::io::Error),

    /// The configuration text is not valid TOML for the expected schema
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// The configuration parsed but violates a constraint
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for qpool operations that can fail in more than one subsystem.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_fault_names_operation_and_device() {
        let err = QueueError::DeviceFault {
            operation: "synchronize",
            device: 1,
            code: 700,
        };
        assert_eq!(
            err.to_string(),
            "synchronize failed on device 1 with runtime status 700"
        );
    }

    #[test]
    fn test_root_error_wraps_subsystems() {
        let err: Error = QueueError::NotInstalled.into();
        assert!(matches!(err, Error::Queue(QueueError::NotInstalled)));

        let err: Error = ConfigError::Invalid("queues_per_pool must be positive".into()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration: queues_per_pool must be positive"
        );
    }
}
