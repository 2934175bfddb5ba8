//! Per-thread current queues.
//!
//! Every host thread has its own table mapping device index to the queue
//! device-agnostic code should use on that device. Nothing here is visible
//! across threads: installing a queue on one thread has no effect on any
//! other.
//!
//! Tables are keyed by registry so that independent queue managers in one
//! process keep independent state. Dropping a registry bumps a generation
//! counter; each thread drops the dead registry's table on its next access,
//! which is the only time the shared set of live registries is locked.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{trace, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use qpool_core::{DeviceIndex, QueueError, QueueHandle};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Ids of registries that have not been dropped
static LIVE_REGISTRIES: Lazy<Mutex<HashSet<u64>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Bumped every time a registry is dropped
static RETIRED_GENERATION: AtomicU64 = AtomicU64::new(0);

#[derive(Default)]
struct ThreadTables {
    generation: u64,
    tables: HashMap<u64, Vec<Option<QueueHandle>>>,
}

impl ThreadTables {
    /// Forget tables of registries dropped since this thread last looked.
    fn prune_retired(&mut self) {
        let generation = RETIRED_GENERATION.load(Ordering::Acquire);
        if generation == self.generation {
            return;
        }
        let live = LIVE_REGISTRIES.lock();
        self.tables.retain(|id, _| live.contains(id));
        self.generation = generation;
    }
}

thread_local! {
    /// Current queue per device, per registry, for this thread
    static CURRENT_QUEUES: RefCell<ThreadTables> = RefCell::new(ThreadTables::default());
}

fn table_index(device: DeviceIndex) -> Option<usize> {
    usize::try_from(device).ok()
}

/// Handle onto the calling thread's current-queue table.
///
/// Negative device indices have no entry: reads return nothing and writes
/// are dropped.
#[derive(Debug)]
pub struct CurrentQueueRegistry {
    id: u64,
}

impl CurrentQueueRegistry {
    /// Create a registry with empty tables on every thread.
    pub fn new() -> Self {
        let id = NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed);
        LIVE_REGISTRIES.lock().insert(id);
        Self { id }
    }

    fn with_table<R>(&self, f: impl FnOnce(&mut Vec<Option<QueueHandle>>) -> R) -> R {
        CURRENT_QUEUES.with(|state| {
            let mut state = state.borrow_mut();
            state.prune_retired();
            f(state.tables.entry(self.id).or_default())
        })
    }

    /// The queue explicitly installed or lazily defaulted for `device` on
    /// this thread.
    pub fn get(&self, device: DeviceIndex) -> Option<QueueHandle> {
        let index = table_index(device)?;
        self.with_table(|table| table.get(index).copied().flatten())
    }

    /// The current queue for `device`, populating it from `default` on first
    /// read.
    ///
    /// A failing `default` leaves the entry empty, so the next read tries again.
    pub fn get_or_init<F>(&self, device: DeviceIndex, default: F) -> Result<QueueHandle, QueueError>
    where
        F: FnOnce() -> Result<QueueHandle, QueueError>,
    {
        if let Some(handle) = self.get(device) {
            return Ok(handle);
        }
        let handle = default()?;
        trace!("Defaulting current queue of device {} to {}", device, handle);
        self.store(device, Some(handle));
        Ok(handle)
    }

    /// Install `handle` as current for its own device, returning the
    /// previous entry.
    pub fn replace(&self, handle: QueueHandle) -> Option<QueueHandle> {
        self.store(handle.device_index(), Some(handle))
    }

    fn store(&self, device: DeviceIndex, handle: Option<QueueHandle>) -> Option<QueueHandle> {
        let Some(index) = table_index(device) else {
            warn!("Ignoring current queue for negative device index {}", device);
            return None;
        };
        self.with_table(|table| {
            if table.len() <= index {
                table.resize(index + 1, None);
            }
            std::mem::replace(&mut table[index], handle)
        })
    }

    #[cfg(test)]
    fn tracked_on_this_thread() -> usize {
        CURRENT_QUEUES.with(|state| state.borrow().tables.len())
    }
}

impl Default for CurrentQueueRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CurrentQueueRegistry {
    fn drop(&mut self) {
        LIVE_REGISTRIES.lock().remove(&self.id);
        RETIRED_GENERATION.fetch_add(1, Ordering::Release);
        // Other threads prune their tables on their next access.
        let _ = CURRENT_QUEUES.try_with(|state| {
            if let Ok(mut state) = state.try_borrow_mut() {
                state.tables.remove(&self.id);
            }
        });
    }
}
