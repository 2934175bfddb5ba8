//! Queue lifecycle operations: completion queries, blocking synchronization
//! and priorities.
//!
//! Each call makes the queue's device active for its duration and puts the
//! previously active device back afterwards.

use log::error;
use qpool_core::runtime::QueueStatus;
use qpool_core::{QueueError, QueueHandle};

use crate::guard::DeviceGuard;
use crate::manager::QueueManager;

impl QueueManager {
    /// Whether all work submitted to the queue has completed.
    ///
    /// Never blocks. A not-ready status is cleared from the runtime and
    /// reported as `false`; any other failure is a device fault.
    pub fn query(&self, handle: &QueueHandle) -> Result<bool, QueueError> {
        let native = self.native_queue(handle)?;
        let _device = DeviceGuard::new(self.runtime(), handle.device_index())?;
        match self.runtime().query(native) {
            QueueStatus::Ready => Ok(true),
            QueueStatus::NotReady => {
                self.runtime().clear_last_error();
                Ok(false)
            }
            QueueStatus::Fault(fault) => {
                error!("Query of {} failed: {}", handle, fault);
                Err(fault.at("query", handle.device_index()))
            }
        }
    }

    /// Block until all work submitted to the queue has completed.
    pub fn synchronize(&self, handle: &QueueHandle) -> Result<(), QueueError> {
        let native = self.native_queue(handle)?;
        let _device = DeviceGuard::new(self.runtime(), handle.device_index())?;
        self.runtime().synchronize(native).map_err(|fault| {
            error!("Synchronize of {} failed: {}", handle, fault);
            fault.at("synchronize", handle.device_index())
        })
    }

    /// Normalized priority of the queue: `0` for normal, negative for more
    /// urgent.
    pub fn priority(&self, handle: &QueueHandle) -> Result<i32, QueueError> {
        let native = self.native_queue(handle)?;
        let range = self.native_priorities()?;
        let _device = DeviceGuard::new(self.runtime(), handle.device_index())?;
        let priority = self
            .runtime()
            .queue_priority(native)
            .map_err(|fault| fault.at("queue_priority", handle.device_index()))?;
        Ok(range.normalize(priority))
    }

    /// Normalized `(min, max)` priority bounds, e.g. `(0, -1)`.
    pub fn priority_range(&self) -> Result<(i32, i32), QueueError> {
        Ok(self.native_priorities()?.normalized_bounds())
    }
}
