//! Per-device, per-priority-class queue pool.
//!
//! A pool is a fixed array of one-time-initialization cells plus a
//! round-robin cursor. A slot's native queue is constructed the first time the
//! cursor lands on it and then lives for the rest of the process. Concurrent
//! first selections of one slot construct it exactly once; a failed
//! construction leaves the cell empty so the next selection retries.

use log::{debug, warn};
use once_cell::sync::OnceCell;

use qpool_core::runtime::{NativeQueue, QueueRuntime};
use qpool_core::{DeviceIndex, QueueClass, QueueError, QueueHandle};

use crate::guard::DeviceGuard;
use crate::sync::RoundRobinCursor;

/// A fixed-size pool of lazily-constructed native queues.
#[derive(Debug)]
pub struct DevicePool {
    /// Device the queues live on
    device: DeviceIndex,

    /// Priority class of every queue in the pool
    class: QueueClass,

    /// One cell per slot, filled on first selection
    slots: Box<[OnceCell<NativeQueue>]>,

    /// Next slot to hand out
    cursor: RoundRobinCursor,
}

impl DevicePool {
    /// Create an empty pool; no native queue is constructed yet.
    pub fn new(device: DeviceIndex, class: QueueClass, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            device,
            class,
            slots: (0..capacity).map(|_| OnceCell::new()).collect(),
            cursor: RoundRobinCursor::new(capacity),
        }
    }

    /// Device the pool serves.
    pub fn device(&self) -> DeviceIndex {
        self.device
    }

    /// Priority class of the pool.
    pub fn class(&self) -> QueueClass {
        self.class
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Advance the cursor and return the selected slot.
    pub fn next_slot(&self) -> usize {
        self.cursor.next()
    }

    /// Native queue of a slot, if it has been constructed.
    pub fn get(&self, slot: usize) -> Option<NativeQueue> {
        self.slots.get(slot).and_then(|cell| cell.get().copied())
    }

    /// Native queue of a slot, constructing it on first use.
    pub fn get_or_create(
        &self,
        slot: usize,
        runtime: &dyn QueueRuntime,
        native_priority: i32,
    ) -> Result<NativeQueue, QueueError> {
        let cell = self.slots.get(slot).ok_or_else(|| {
            QueueError::UnknownQueue(QueueHandle::pooled(self.device, self.class, slot))
        })?;

        if let Some(queue) = cell.get() {
            return Ok(*queue);
        }

        cell.get_or_try_init(|| {
            let _device = DeviceGuard::new(runtime, self.device)?;
            let queue = runtime.create_queue(native_priority).map_err(|fault| {
                warn!(
                    "Failed to create {} priority queue for slot {} on device {}: {}",
                    self.class, slot, self.device, fault
                );
                fault.at("create_queue", self.device)
            })?;
            debug!(
                "Constructed native queue {} for {} slot {} on device {}",
                queue, self.class, slot, self.device
            );
            Ok(queue)
        })
        .copied()
    }

    /// Number of slots whose native queue has been constructed.
    pub fn constructed(&self) -> usize {
        self.slots.iter().filter(|cell| cell.get().is_some()).count()
    }
}
