//! Scoped guards.
//!
//! [`ScopedQueueGuard`] swaps the calling thread's current queue for one
//! device and puts the previous queue back when dropped, on every exit path
//! including unwinding. [`DeviceGuard`] does the same for the runtime's active
//! device around individual runtime calls.
//!
//! Guards for the same device must be dropped in reverse order of creation.
//! Releasing them out of order leaves whichever queue the last-dropped guard
//! saved; this is not detected.

use std::marker::PhantomData;

use log::warn;
use qpool_core::runtime::QueueRuntime;
use qpool_core::{DeviceIndex, QueueError, QueueHandle};

use crate::manager::QueueManager;

/// Makes a device active on the calling thread for the guard's lifetime.
#[must_use = "the previous device is restored as soon as the guard is dropped"]
pub struct DeviceGuard<'a> {
    runtime: &'a dyn QueueRuntime,
    original: DeviceIndex,
    target: DeviceIndex,
    _not_send: PhantomData<*const ()>,
}

impl<'a> DeviceGuard<'a> {
    /// Activate `device`, remembering the device that was active before.
    pub fn new(runtime: &'a dyn QueueRuntime, device: DeviceIndex) -> Result<Self, QueueError> {
        let original = runtime.current_device();
        if original != device {
            runtime
                .set_device(device)
                .map_err(|fault| fault.at("set_device", device))?;
        }
        Ok(Self {
            runtime,
            original,
            target: device,
            _not_send: PhantomData,
        })
    }

    /// Device that was active when the guard was created.
    pub fn original_device(&self) -> DeviceIndex {
        self.original
    }
}

impl Drop for DeviceGuard<'_> {
    fn drop(&mut self) {
        if self.original != self.target {
            if let Err(fault) = self.runtime.set_device(self.original) {
                warn!(
                    "Failed to restore active device {} after using device {}: {}",
                    self.original, self.target, fault
                );
            }
        }
    }
}

/// Installs a queue as the current queue of its device for the guard's
/// lifetime.
#[must_use = "the previous queue is restored as soon as the guard is dropped"]
pub struct ScopedQueueGuard<'a> {
    manager: &'a QueueManager,
    original: QueueHandle,
    current: QueueHandle,
    _not_send: PhantomData<*const ()>,
}

impl<'a> ScopedQueueGuard<'a> {
    /// Save the current queue of `handle`'s device and install `handle`.
    pub fn new(manager: &'a QueueManager, handle: QueueHandle) -> Result<Self, QueueError> {
        let original = manager.current_queue(handle.device_index())?;
        manager.set_current_queue(handle)?;
        Ok(Self {
            manager,
            original,
            current: handle,
            _not_send: PhantomData,
        })
    }

    /// Switch the guard to another queue.
    ///
    /// On the same device only the installed queue changes. On another device
    /// the original device's queue is restored first and the new device's
    /// current queue becomes the one restored on drop.
    pub fn reset_queue(&mut self, handle: QueueHandle) -> Result<(), QueueError> {
        if handle.device_index() == self.original.device_index() {
            self.manager.set_current_queue(handle)?;
        } else {
            let original = self.manager.current_queue(handle.device_index())?;
            self.manager.set_current_queue(handle)?;
            self.manager.restore_current(self.original);
            self.original = original;
        }
        self.current = handle;
        Ok(())
    }

    /// Queue that will be restored on drop.
    pub fn original_queue(&self) -> QueueHandle {
        self.original
    }

    /// Queue installed by this guard.
    pub fn current_queue(&self) -> QueueHandle {
        self.current
    }
}

impl Drop for ScopedQueueGuard<'_> {
    fn drop(&mut self) {
        self.manager.restore_current(self.original);
    }
}
