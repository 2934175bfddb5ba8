//! Process-wide table of device pools.
//!
//! Each known device gets a pair of pools, one per priority class. The pair is
//! created the first time anything asks for that device and is never torn
//! down. After warm-up a lookup is one initialized-cell read.

use log::info;
use once_cell::sync::OnceCell;

use qpool_core::runtime::NativeQueue;
use qpool_core::{DeviceIndex, QueueClass, QueueError, QueueHandle};

use super::device::DevicePool;

/// The normal and high priority pools of one device.
#[derive(Debug)]
struct DevicePools {
    normal: DevicePool,
    high: DevicePool,
}

impl DevicePools {
    fn new(device: DeviceIndex, capacity: usize) -> Self {
        info!(
            "Initializing queue pools for device {} with {} queues per class",
            device, capacity
        );
        Self {
            normal: DevicePool::new(device, QueueClass::Normal, capacity),
            high: DevicePool::new(device, QueueClass::High, capacity),
        }
    }

    fn get(&self, class: QueueClass) -> &DevicePool {
        match class {
            QueueClass::Normal => &self.normal,
            QueueClass::High => &self.high,
        }
    }
}

/// Table of device pools, one pair per known device.
#[derive(Debug)]
pub struct PoolRegistry {
    /// Slots per pool
    capacity: usize,

    /// One lazily-created pool pair per device
    devices: Box<[OnceCell<DevicePools>]>,
}

impl PoolRegistry {
    /// Create a registry for `device_count` devices; no pool exists yet.
    pub fn new(device_count: DeviceIndex, capacity: usize) -> Self {
        let device_count = device_count.max(0) as usize;
        Self {
            capacity: capacity.max(1),
            devices: (0..device_count).map(|_| OnceCell::new()).collect(),
        }
    }

    /// Number of known devices.
    pub fn device_count(&self) -> DeviceIndex {
        self.devices.len() as DeviceIndex
    }

    /// Slots per pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check that `device` names a known device.
    pub fn check_device(&self, device: DeviceIndex) -> Result<usize, QueueError> {
        usize::try_from(device)
            .ok()
            .filter(|index| *index < self.devices.len())
            .ok_or(QueueError::InvalidDevice {
                device,
                count: self.device_count(),
            })
    }

    /// The pool for a (device, class) pair, creating the device's pools on
    /// first use.
    pub fn pool(&self, device: DeviceIndex, class: QueueClass) -> Result<&DevicePool, QueueError> {
        let index = self.check_device(device)?;
        let pools = self.devices[index].get_or_init(|| DevicePools::new(device, self.capacity));
        Ok(pools.get(class))
    }

    /// The pool for a (device, class) pair, if it has been created.
    pub fn existing_pool(&self, device: DeviceIndex, class: QueueClass) -> Option<&DevicePool> {
        let index = self.check_device(device).ok()?;
        self.devices[index].get().map(|pools| pools.get(class))
    }

    /// Native queue behind a pooled handle.
    ///
    /// This is a pure lookup: it never creates a pool or a queue, so a handle
    /// for a slot nobody has selected yet resolves to `None`.
    pub fn lookup(&self, handle: &QueueHandle) -> Option<NativeQueue> {
        let class = handle.class()?;
        let slot = handle.slot()?;
        self.existing_pool(handle.device_index(), class)?.get(slot)
    }

    /// Number of native queues constructed for a (device, class) pair.
    pub fn constructed(&self, device: DeviceIndex, class: QueueClass) -> usize {
        self.existing_pool(device, class)
            .map(DevicePool::constructed)
            .unwrap_or(0)
    }
}
