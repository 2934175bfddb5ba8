//! The accelerator runtime seam.
//!
//! Everything qpool needs from the vendor runtime goes through
//! [`QueueRuntime`]: device enumeration, the per-thread active device, native
//! queue construction and the query/synchronize/priority calls. A simulated
//! in-process implementation is provided for tests and tooling.

pub mod simulated;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::device::DeviceIndex;
use crate::error::QueueError;
use crate::priority::NativePriorityRange;

pub use simulated::{SimulatedConfig, SimulatedRuntime};

/// Opaque native queue handle as handed out by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeQueue(u64);

impl NativeQueue {
    /// Wrap a raw native handle.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw native handle.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NativeQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Non-success status code reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("runtime status {code}")]
pub struct RuntimeFault {
    /// Native status code
    pub code: i32,
}

impl RuntimeFault {
    /// Create a fault from a native status code.
    pub fn new(code: i32) -> Self {
        Self { code }
    }

    /// Attach the failing operation and device.
    pub fn at(self, operation: &'static str, device: DeviceIndex) -> QueueError {
        QueueError::DeviceFault {
            operation,
            device,
            code: self.code,
        }
    }
}

/// Outcome of a non-blocking queue query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// All submitted work has completed
    Ready,

    /// Work is still in flight; the runtime has latched a transient error
    NotReady,

    /// The runtime reported a fault
    Fault(RuntimeFault),
}

/// Interface onto the accelerator runtime.
///
/// Implementations must be safe for concurrent use from many host threads,
/// including concurrent submission to one native queue.
pub trait QueueRuntime: Send + Sync + 'static {
    /// Human-readable runtime name.
    fn name(&self) -> &str;

    /// Number of devices visible to the process.
    fn device_count(&self) -> DeviceIndex;

    /// Device currently active on the calling thread.
    fn current_device(&self) -> DeviceIndex;

    /// Make a device active on the calling thread.
    fn set_device(&self, device: DeviceIndex) -> Result<(), RuntimeFault>;

    /// Construct a native queue on the active device.
    fn create_queue(&self, native_priority: i32) -> Result<NativeQueue, RuntimeFault>;

    /// Check, without blocking, whether all work on a queue has completed.
    fn query(&self, queue: NativeQueue) -> QueueStatus;

    /// Clear the runtime's latched last error.
    fn clear_last_error(&self);

    /// Block until all work on a queue has completed.
    fn synchronize(&self, queue: NativeQueue) -> Result<(), RuntimeFault>;

    /// Native priority of a queue.
    fn queue_priority(&self, queue: NativeQueue) -> Result<i32, RuntimeFault>;

    /// Native `(least, greatest)` priority bounds.
    fn priority_range(&self) -> Result<(i32, i32), RuntimeFault>;

    /// Validated native priority bounds.
    ///
    /// The default applies the reference runtime's convention. Runtimes that
    /// number priorities differently override this and build the range with
    /// [`NativePriorityRange::with_convention`].
    fn native_priority_range(&self) -> Result<NativePriorityRange, QueueError> {
        let device = self.current_device();
        let (least, greatest) = self
            .priority_range()
            .map_err(|fault| fault.at("priority_range", device))?;
        NativePriorityRange::new(least, greatest)
    }
}
