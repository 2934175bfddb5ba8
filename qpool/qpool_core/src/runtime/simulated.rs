//! In-process simulated accelerator runtime.
//!
//! Queues are plain table entries. Work is modelled as a busy deadline per
//! queue, so `query` reports not-ready until the deadline passes and
//! `synchronize` sleeps until it does. Faults can be injected per queue and
//! queue construction can be made to fail, which is enough to exercise every
//! error path of the pool without hardware.

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::{NativeQueue, QueueRuntime, QueueStatus, RuntimeFault};
use crate::device::DeviceIndex;

/// Native status codes used by the simulated runtime.
pub mod status {
    /// Allocation failure while constructing a queue
    pub const MEMORY_ALLOCATION: i32 = 2;
    /// Device index out of range
    pub const INVALID_DEVICE: i32 = 101;
    /// Native handle not known to the runtime
    pub const INVALID_HANDLE: i32 = 400;
    /// Work still in flight
    pub const NOT_READY: i32 = 600;
    /// Generic launch failure, used as the default injected fault
    pub const LAUNCH_FAILURE: i32 = 719;
}

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE_DEVICES: RefCell<HashMap<u64, DeviceIndex>> = RefCell::new(HashMap::new());
}

/// Configuration for the simulated runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// Number of simulated devices
    #[serde(default = "default_device_count")]
    pub device_count: DeviceIndex,

    /// Least urgent native priority
    #[serde(default = "default_least_priority")]
    pub least_priority: i32,

    /// Most urgent native priority
    #[serde(default)]
    pub greatest_priority: i32,
}

fn default_device_count() -> DeviceIndex {
    2
}

fn default_least_priority() -> i32 {
    1
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            device_count: default_device_count(),
            least_priority: default_least_priority(),
            greatest_priority: 0,
        }
    }
}

#[derive(Debug)]
struct SimQueue {
    device: DeviceIndex,
    priority: i32,
    busy_until: Option<Instant>,
    fault: Option<i32>,
}

/// Simulated accelerator runtime.
#[derive(Debug)]
pub struct SimulatedRuntime {
    id: u64,
    config: SimulatedConfig,
    queues: RwLock<HashMap<NativeQueue, SimQueue>>,
    next_handle: AtomicU64,
    created: Vec<AtomicUsize>,
    failing_creations: AtomicUsize,
    last_error: Mutex<Option<i32>>,
}

impl SimulatedRuntime {
    /// Create a runtime with the given configuration.
    pub fn new(config: SimulatedConfig) -> Self {
        let device_count = config.device_count.max(0) as usize;
        debug!(
            "Creating simulated runtime with {} device(s), priorities [{}, {}]",
            device_count, config.least_priority, config.greatest_priority
        );
        Self {
            id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
            config,
            queues: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(0x1000),
            created: (0..device_count).map(|_| AtomicUsize::new(0)).collect(),
            failing_creations: AtomicUsize::new(0),
            last_error: Mutex::new(None),
        }
    }

    /// Create a runtime with `device_count` devices and default priorities.
    pub fn with_devices(device_count: DeviceIndex) -> Self {
        Self::new(SimulatedConfig {
            device_count,
            ..SimulatedConfig::default()
        })
    }

    /// Configuration this runtime was built with.
    pub fn config(&self) -> &SimulatedConfig {
        &self.config
    }

    /// Number of native queues constructed on a device so far.
    pub fn created_queues(&self, device: DeviceIndex) -> usize {
        usize::try_from(device)
            .ok()
            .and_then(|index| self.created.get(index))
            .map(|count| count.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Number of native queues constructed across all devices.
    pub fn total_created_queues(&self) -> usize {
        self.created.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    /// Device a native queue lives on.
    pub fn queue_device(&self, queue: NativeQueue) -> Option<DeviceIndex> {
        self.queues.read().get(&queue).map(|q| q.device)
    }

    /// Make the next `count` queue constructions fail.
    pub fn fail_next_creations(&self, count: usize) {
        self.failing_creations.store(count, Ordering::SeqCst);
    }

    /// Submit simulated work that keeps the queue busy for `duration`.
    ///
    /// Work on one queue runs serially, so the new deadline extends any
    /// work already in flight.
    pub fn enqueue(&self, queue: NativeQueue, duration: Duration) -> Result<(), RuntimeFault> {
        let mut queues = self.queues.write();
        let entry = queues
            .get_mut(&queue)
            .ok_or(RuntimeFault::new(status::INVALID_HANDLE))?;
        let now = Instant::now();
        let start = entry.busy_until.filter(|t| *t > now).unwrap_or(now);
        entry.busy_until = Some(start + duration);
        trace!("Enqueued {:?} of work on native queue {}", duration, queue);
        Ok(())
    }

    /// Put a queue into a faulted state with the given status code.
    pub fn inject_fault(&self, queue: NativeQueue, code: i32) -> Result<(), RuntimeFault> {
        let mut queues = self.queues.write();
        let entry = queues
            .get_mut(&queue)
            .ok_or(RuntimeFault::new(status::INVALID_HANDLE))?;
        entry.fault = Some(code);
        Ok(())
    }

    /// The latched last error, if any.
    pub fn last_error(&self) -> Option<i32> {
        *self.last_error.lock()
    }

    fn check_device(&self, device: DeviceIndex) -> Result<(), RuntimeFault> {
        if device < 0 || device >= self.config.device_count {
            return Err(RuntimeFault::new(status::INVALID_DEVICE));
        }
        Ok(())
    }

    fn take_failing_creation(&self) -> bool {
        self.failing_creations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn latch(&self, fault: RuntimeFault) -> RuntimeFault {
        *self.last_error.lock() = Some(fault.code);
        fault
    }
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

impl QueueRuntime for SimulatedRuntime {
    fn name(&self) -> &str {
        "simulated"
    }

    fn device_count(&self) -> DeviceIndex {
        self.config.device_count
    }

    fn current_device(&self) -> DeviceIndex {
        ACTIVE_DEVICES.with(|active| active.borrow().get(&self.id).copied().unwrap_or(0))
    }

    fn set_device(&self, device: DeviceIndex) -> Result<(), RuntimeFault> {
        self.check_device(device).map_err(|fault| self.latch(fault))?;
        ACTIVE_DEVICES.with(|active| {
            active.borrow_mut().insert(self.id, device);
        });
        Ok(())
    }

    fn create_queue(&self, native_priority: i32) -> Result<NativeQueue, RuntimeFault> {
        let device = self.current_device();
        self.check_device(device).map_err(|fault| self.latch(fault))?;
        if self.take_failing_creation() {
            return Err(self.latch(RuntimeFault::new(status::MEMORY_ALLOCATION)));
        }

        let bounds = (self.config.least_priority, self.config.greatest_priority);
        let priority = native_priority.clamp(bounds.0.min(bounds.1), bounds.0.max(bounds.1));
        let queue = NativeQueue::from_raw(self.next_handle.fetch_add(0x10, Ordering::Relaxed));
        self.queues.write().insert(
            queue,
            SimQueue {
                device,
                priority,
                busy_until: None,
                fault: None,
            },
        );
        self.created[device as usize].fetch_add(1, Ordering::SeqCst);
        trace!(
            "Created native queue {} on device {} with priority {}",
            queue,
            device,
            priority
        );
        Ok(queue)
    }

    fn query(&self, queue: NativeQueue) -> QueueStatus {
        let queues = self.queues.read();
        let entry = match queues.get(&queue) {
            Some(entry) => entry,
            None => return QueueStatus::Fault(self.latch(RuntimeFault::new(status::INVALID_HANDLE))),
        };
        if let Some(code) = entry.fault {
            return QueueStatus::Fault(self.latch(RuntimeFault::new(code)));
        }
        match entry.busy_until {
            Some(deadline) if deadline > Instant::now() => {
                self.latch(RuntimeFault::new(status::NOT_READY));
                QueueStatus::NotReady
            }
            _ => QueueStatus::Ready,
        }
    }

    fn clear_last_error(&self) {
        *self.last_error.lock() = None;
    }

    fn synchronize(&self, queue: NativeQueue) -> Result<(), RuntimeFault> {
        let deadline = {
            let queues = self.queues.read();
            let entry = queues
                .get(&queue)
                .ok_or_else(|| self.latch(RuntimeFault::new(status::INVALID_HANDLE)))?;
            if let Some(code) = entry.fault {
                return Err(self.latch(RuntimeFault::new(code)));
            }
            entry.busy_until
        };

        if let Some(deadline) = deadline {
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
        }
        Ok(())
    }

    fn queue_priority(&self, queue: NativeQueue) -> Result<i32, RuntimeFault> {
        self.queues
            .read()
            .get(&queue)
            .map(|entry| entry.priority)
            .ok_or_else(|| self.latch(RuntimeFault::new(status::INVALID_HANDLE)))
    }

    fn priority_range(&self) -> Result<(i32, i32), RuntimeFault> {
        Ok((self.config.least_priority, self.config.greatest_priority))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_queue_on_active_device() {
        let runtime = SimulatedRuntime::with_devices(2);
        assert_eq!(runtime.current_device(), 0);

        runtime.set_device(1).unwrap();
        let queue = runtime.create_queue(1).unwrap();
        assert_eq!(runtime.queue_device(queue), Some(1));
        assert_eq!(runtime.created_queues(1), 1);
        assert_eq!(runtime.created_queues(0), 0);
    }

    #[test]
    fn test_set_device_out_of_range() {
        let runtime = SimulatedRuntime::with_devices(1);
        assert_eq!(
            runtime.set_device(3),
            Err(RuntimeFault::new(status::INVALID_DEVICE))
        );
        assert_eq!(runtime.current_device(), 0);
    }

    #[test]
    fn test_query_tracks_enqueued_work() {
        let runtime = SimulatedRuntime::default();
        let queue = runtime.create_queue(1).unwrap();
        assert_eq!(runtime.query(queue), QueueStatus::Ready);

        runtime.enqueue(queue, Duration::from_secs(60)).unwrap();
        assert_eq!(runtime.query(queue), QueueStatus::NotReady);
        assert_eq!(runtime.last_error(), Some(status::NOT_READY));

        runtime.clear_last_error();
        assert_eq!(runtime.last_error(), None);
    }

    #[test]
    fn test_synchronize_waits_for_deadline() {
        let runtime = SimulatedRuntime::default();
        let queue = runtime.create_queue(1).unwrap();
        runtime.enqueue(queue, Duration::from_millis(20)).unwrap();

        let start = Instant::now();
        runtime.synchronize(queue).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(15));
        assert_eq!(runtime.query(queue), QueueStatus::Ready);
    }

    #[test]
    fn test_injected_fault() {
        let runtime = SimulatedRuntime::default();
        let queue = runtime.create_queue(1).unwrap();
        runtime.inject_fault(queue, status::LAUNCH_FAILURE).unwrap();

        assert_eq!(
            runtime.query(queue),
            QueueStatus::Fault(RuntimeFault::new(status::LAUNCH_FAILURE))
        );
        assert_eq!(
            runtime.synchronize(queue),
            Err(RuntimeFault::new(status::LAUNCH_FAILURE))
        );
    }

    #[test]
    fn test_failing_creations_are_consumed() {
        let runtime = SimulatedRuntime::default();
        runtime.fail_next_creations(1);
        assert_eq!(
            runtime.create_queue(1),
            Err(RuntimeFault::new(status::MEMORY_ALLOCATION))
        );
        assert!(runtime.create_queue(1).is_ok());
        assert_eq!(runtime.total_created_queues(), 1);
    }

    #[test]
    fn test_priority_is_clamped_to_range() {
        let runtime = SimulatedRuntime::default();
        let queue = runtime.create_queue(-5).unwrap();
        assert_eq!(runtime.queue_priority(queue), Ok(0));
        assert_eq!(runtime.priority_range(), Ok((1, 0)));
    }

    #[test]
    fn test_unknown_handle() {
        let runtime = SimulatedRuntime::default();
        let bogus = NativeQueue::from_raw(0x7);
        assert_eq!(
            runtime.query(bogus),
            QueueStatus::Fault(RuntimeFault::new(status::INVALID_HANDLE))
        );
        assert!(runtime.queue_priority(bogus).is_err());
    }
}
