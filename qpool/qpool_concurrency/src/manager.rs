//! Queue manager.
//!
//! [`QueueManager`] ties the pieces together: the runtime, the pool registry
//! and the per-thread current-queue table. It is the object consumers hold (or
//! reach through [`crate::global`]) to acquire queues, install them as current
//! and run lifecycle operations on them.

use std::sync::Arc;

use log::{info, trace};
use once_cell::sync::OnceCell;

use qpool_core::runtime::{NativeQueue, QueueRuntime};
use qpool_core::{
    DeviceIndex, DeviceKind, NativePriorityRange, PackedQueue, QueueClass, QueueError,
    QueueHandle, QueuePoolConfig,
};

use crate::current::CurrentQueueRegistry;
use crate::guard::ScopedQueueGuard;
use crate::pool::PoolRegistry;

/// Owner of every pooled queue for one runtime.
pub struct QueueManager {
    runtime: Arc<dyn QueueRuntime>,
    config: QueuePoolConfig,
    registry: PoolRegistry,
    current: CurrentQueueRegistry,
    priorities: OnceCell<NativePriorityRange>,
}

impl QueueManager {
    /// Create a manager over `runtime`.
    ///
    /// The set of known devices is fixed here: the runtime's device count,
    /// capped by `config.max_devices`. No pool or queue is created yet.
    pub fn new(runtime: Arc<dyn QueueRuntime>, config: QueuePoolConfig) -> qpool_core::Result<Self> {
        config.validate()?;
        let reported = runtime.device_count().max(0);
        let device_count = config.max_devices.map_or(reported, |max| reported.min(max));
        info!(
            "Queue manager on {} runtime: {} device(s), {} queues per pool",
            runtime.name(),
            device_count,
            config.queues_per_pool
        );
        Ok(Self {
            registry: PoolRegistry::new(device_count, config.queues_per_pool),
            runtime,
            config,
            current: CurrentQueueRegistry::new(),
            priorities: OnceCell::new(),
        })
    }

    /// The runtime queues are created on.
    pub fn runtime(&self) -> &dyn QueueRuntime {
        self.runtime.as_ref()
    }

    /// Configuration the manager was built with.
    pub fn config(&self) -> &QueuePoolConfig {
        &self.config
    }

    /// Number of known devices.
    pub fn device_count(&self) -> DeviceIndex {
        self.registry.device_count()
    }

    /// Slots per (device, priority class) pool.
    pub fn queues_per_pool(&self) -> usize {
        self.registry.capacity()
    }

    /// Map the current-device sentinel to the active device and validate.
    pub fn resolve_device(&self, device: DeviceIndex) -> Result<DeviceIndex, QueueError> {
        let device = if device < 0 {
            self.runtime.current_device()
        } else {
            device
        };
        self.registry.check_device(device)?;
        Ok(device)
    }

    pub(crate) fn native_priorities(&self) -> Result<NativePriorityRange, QueueError> {
        self.priorities
            .get_or_try_init(|| self.runtime.native_priority_range())
            .copied()
    }

    fn pooled_slot(
        &self,
        device: DeviceIndex,
        class: QueueClass,
        slot: Option<usize>,
    ) -> Result<QueueHandle, QueueError> {
        let pool = self.registry.pool(device, class)?;
        let slot = slot.unwrap_or_else(|| pool.next_slot());
        let native_priority = self.native_priorities()?.native_for(class);
        pool.get_or_create(slot, self.runtime.as_ref(), native_priority)?;
        Ok(QueueHandle::pooled(device, class, slot))
    }

    /// Take the next queue from a device's pool.
    ///
    /// Slots are handed out round-robin; the slot's native queue is
    /// constructed on its first selection. A negative `device` means the
    /// active device.
    pub fn acquire_pooled(&self, device: DeviceIndex, high_priority: bool) -> Result<QueueHandle, QueueError> {
        let device = self.resolve_device(device)?;
        let handle = self.pooled_slot(device, QueueClass::from_high_priority(high_priority), None)?;
        trace!("Acquired {}", handle);
        Ok(handle)
    }

    /// Wrap a native queue owned by the caller.
    ///
    /// Nothing is constructed and the manager never destroys it; the caller
    /// keeps it alive while handles to it are in use.
    pub fn acquire_external(&self, native: NativeQueue, device: DeviceIndex) -> Result<QueueHandle, QueueError> {
        let device = self.resolve_device(device)?;
        QueueHandle::external(native, device)
    }

    /// The default queue of a device: slot 0 of its normal-priority pool.
    pub fn default_queue(&self, device: DeviceIndex) -> Result<QueueHandle, QueueError> {
        let device = self.resolve_device(device)?;
        self.pooled_slot(device, QueueClass::Normal, Some(0))
    }

    /// The calling thread's current queue for a device.
    ///
    /// Falls back to [`default_queue`](Self::default_queue) until something is
    /// installed.
    pub fn current_queue(&self, device: DeviceIndex) -> Result<QueueHandle, QueueError> {
        let device = self.resolve_device(device)?;
        self.current
            .get_or_init(device, || self.default_queue(device))
    }

    /// Install `handle` as the calling thread's current queue for the device
    /// the handle belongs to.
    ///
    /// The active device plays no part: installing a device 2 queue while
    /// device 0 is active changes only device 2's entry.
    pub fn set_current_queue(&self, handle: QueueHandle) -> Result<(), QueueError> {
        self.check_handle(&handle)?;
        self.current.replace(handle);
        Ok(())
    }

    pub(crate) fn restore_current(&self, handle: QueueHandle) {
        self.current.replace(handle);
    }

    /// Install `handle` as current until the returned guard is dropped.
    pub fn scoped(&self, handle: QueueHandle) -> Result<ScopedQueueGuard<'_>, QueueError> {
        ScopedQueueGuard::new(self, handle)
    }

    fn check_handle(&self, handle: &QueueHandle) -> Result<(), QueueError> {
        if handle.device_kind() != DeviceKind::Accelerator {
            return Err(QueueError::WrongDeviceKind(handle.device_kind()));
        }
        self.registry.check_device(handle.device_index())?;
        Ok(())
    }

    /// Native queue a handle refers to.
    ///
    /// Pooled handles are looked up in the registry and external handles
    /// carry their native queue; nothing is ever constructed here.
    pub fn native_queue(&self, handle: &QueueHandle) -> Result<NativeQueue, QueueError> {
        self.check_handle(handle)?;
        match handle.id().native() {
            Some(native) => Ok(native),
            None => self
                .registry
                .lookup(handle)
                .ok_or(QueueError::UnknownQueue(*handle)),
        }
    }

    /// Flatten a handle for passing across a component boundary.
    pub fn pack(&self, handle: &QueueHandle) -> PackedQueue {
        handle.pack()
    }

    /// Rebuild a handle from a packed triple and confirm it names a queue
    /// that already exists.
    pub fn unpack(&self, packed: PackedQueue) -> Result<QueueHandle, QueueError> {
        let handle = QueueHandle::unpack(packed)?;
        self.native_queue(&handle)?;
        Ok(handle)
    }

    /// Number of native queues constructed for a (device, class) pair.
    pub fn constructed_queues(&self, device: DeviceIndex, class: QueueClass) -> usize {
        self.registry.constructed(device, class)
    }
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("runtime", &self.runtime.name())
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpool_core::{SimulatedConfig, SimulatedRuntime};

    fn setup(devices: DeviceIndex, capacity: usize) -> (Arc<SimulatedRuntime>, QueueManager) {
        let runtime = Arc::new(SimulatedRuntime::with_devices(devices));
        let manager = QueueManager::new(
            runtime.clone(),
            QueuePoolConfig {
                queues_per_pool: capacity,
                max_devices: None,
            },
        )
        .unwrap();
        (runtime, manager)
    }

    #[test]
    fn test_round_robin_period() {
        let (_runtime, manager) = setup(1, 4);
        let slots: Vec<_> = (0..9)
            .map(|_| manager.acquire_pooled(0, false).unwrap().slot().unwrap())
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 3, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_priority_classes_are_independent() {
        let (runtime, manager) = setup(1, 4);
        let normal = manager.acquire_pooled(0, false).unwrap();
        let high = manager.acquire_pooled(0, true).unwrap();

        assert_eq!(normal.slot(), Some(0));
        assert_eq!(high.slot(), Some(0));
        assert_ne!(normal, high);
        assert_ne!(
            manager.native_queue(&normal).unwrap(),
            manager.native_queue(&high).unwrap()
        );
        assert_eq!(runtime.created_queues(0), 2);
    }

    #[test]
    fn test_queues_constructed_once_per_slot() {
        let (runtime, manager) = setup(1, 4);
        for _ in 0..20 {
            manager.acquire_pooled(0, false).unwrap();
        }
        assert_eq!(runtime.created_queues(0), 4);
        assert_eq!(manager.constructed_queues(0, QueueClass::Normal), 4);
        assert_eq!(manager.constructed_queues(0, QueueClass::High), 0);
    }

    #[test]
    fn test_default_queue_is_normal_slot_zero() {
        let (_runtime, manager) = setup(2, 4);
        let default = manager.default_queue(1).unwrap();
        assert_eq!(default, QueueHandle::pooled(1, QueueClass::Normal, 0));
        assert!(manager.native_queue(&default).is_ok());
    }

    #[test]
    fn test_current_device_sentinel() {
        let (runtime, manager) = setup(2, 4);
        runtime.set_device(1).unwrap();
        let handle = manager.acquire_pooled(qpool_core::CURRENT_DEVICE, true).unwrap();
        assert_eq!(handle.device_index(), 1);
        assert_eq!(manager.current_queue(-1).unwrap().device_index(), 1);
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        let (_runtime, manager) = setup(2, 4);
        assert_eq!(
            manager.acquire_pooled(5, false),
            Err(QueueError::InvalidDevice {
                device: 5,
                count: 2
            })
        );
        assert!(manager.default_queue(2).is_err());
        assert!(manager.current_queue(9).is_err());
    }

    #[test]
    fn test_max_devices_caps_known_devices() {
        let runtime = Arc::new(SimulatedRuntime::with_devices(4));
        let manager = QueueManager::new(
            runtime,
            QueuePoolConfig {
                queues_per_pool: 2,
                max_devices: Some(1),
            },
        )
        .unwrap();
        assert_eq!(manager.device_count(), 1);
        assert!(manager.acquire_pooled(1, false).is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let runtime = Arc::new(SimulatedRuntime::default());
        let result = QueueManager::new(
            runtime,
            QueuePoolConfig {
                queues_per_pool: 0,
                max_devices: None,
            },
        );
        assert!(matches!(result, Err(qpool_core::Error::Config(_))));
    }

    #[test]
    fn test_set_current_only_touches_handle_device() {
        let (runtime, manager) = setup(3, 4);
        let before0 = manager.current_queue(0).unwrap();
        let before1 = manager.current_queue(1).unwrap();

        // Device 0 is active, but the queue belongs to device 2.
        assert_eq!(runtime.current_device(), 0);
        let on2 = manager.acquire_pooled(2, true).unwrap();
        manager.set_current_queue(on2).unwrap();

        assert_eq!(manager.current_queue(2).unwrap(), on2);
        assert_eq!(manager.current_queue(0).unwrap(), before0);
        assert_eq!(manager.current_queue(1).unwrap(), before1);
    }

    #[test]
    fn test_external_queue_round_trip() {
        let (runtime, manager) = setup(1, 4);
        let native = runtime.create_queue(1).unwrap();
        let created = runtime.total_created_queues();

        let handle = manager.acquire_external(native, 0).unwrap();
        assert!(handle.is_external());
        assert_eq!(manager.native_queue(&handle).unwrap(), native);

        let unpacked = manager.unpack(manager.pack(&handle)).unwrap();
        assert_eq!(unpacked, handle);
        assert_eq!(manager.native_queue(&unpacked).unwrap(), native);
        assert_eq!(runtime.total_created_queues(), created);
    }

    #[test]
    fn test_unpack_resolves_existing_pooled_queue() {
        let (runtime, manager) = setup(1, 4);
        let handle = manager.acquire_pooled(0, true).unwrap();
        let native = manager.native_queue(&handle).unwrap();
        let created = runtime.total_created_queues();

        let unpacked = manager.unpack(handle.pack()).unwrap();
        assert_eq!(unpacked, handle);
        assert_eq!(manager.native_queue(&unpacked).unwrap(), native);
        assert_eq!(runtime.total_created_queues(), created);
    }

    #[test]
    fn test_unpack_never_constructs() {
        let (runtime, manager) = setup(1, 4);
        let forged = QueueHandle::pooled(0, QueueClass::High, 3).pack();
        assert!(matches!(
            manager.unpack(forged),
            Err(QueueError::UnknownQueue(_))
        ));
        assert_eq!(runtime.total_created_queues(), 0);
    }

    #[test]
    fn test_construction_failure_surfaces_and_retries() {
        let (runtime, manager) = setup(1, 2);
        runtime.fail_next_creations(1);
        assert!(matches!(
            manager.acquire_pooled(0, false),
            Err(QueueError::DeviceFault {
                operation: "create_queue",
                ..
            })
        ));
        // The cursor moved on, but slot 0 is still constructible later.
        assert_eq!(manager.acquire_pooled(0, false).unwrap().slot(), Some(1));
        assert_eq!(manager.acquire_pooled(0, false).unwrap().slot(), Some(0));
        assert_eq!(runtime.created_queues(0), 2);
    }

    #[test]
    fn test_bad_priority_range_is_fatal_for_acquire() {
        let runtime = Arc::new(SimulatedRuntime::new(SimulatedConfig {
            device_count: 1,
            least_priority: 0,
            greatest_priority: -1,
        }));
        let manager = QueueManager::new(runtime, QueuePoolConfig::default()).unwrap();
        assert_eq!(
            manager.acquire_pooled(0, false),
            Err(QueueError::PriorityRange {
                least: 0,
                greatest: -1
            })
        );
    }
}
