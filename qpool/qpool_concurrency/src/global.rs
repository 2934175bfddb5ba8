//! Process-wide queue manager.
//!
//! Device-agnostic consumers do not thread a [`QueueManager`] through their
//! call chains; they reach the one installed here. It is installed once at
//! startup and lives until the process exits.

use std::sync::Arc;

use log::info;
use once_cell::sync::OnceCell;

use qpool_core::runtime::NativeQueue;
use qpool_core::{DeviceIndex, QueueError, QueueHandle};

use crate::guard::ScopedQueueGuard;
use crate::manager::QueueManager;

static GLOBAL_MANAGER: OnceCell<Arc<QueueManager>> = OnceCell::new();

/// Install the process-wide manager.
///
/// Fails if one is already installed; the first installation wins.
pub fn install(manager: QueueManager) -> Result<Arc<QueueManager>, QueueError> {
    let manager = Arc::new(manager);
    GLOBAL_MANAGER
        .set(Arc::clone(&manager))
        .map_err(|_| QueueError::AlreadyInstalled)?;
    info!("Installed process-wide queue manager");
    Ok(manager)
}

/// The process-wide manager.
pub fn global() -> Result<&'static QueueManager, QueueError> {
    GLOBAL_MANAGER
        .get()
        .map(Arc::as_ref)
        .ok_or(QueueError::NotInstalled)
}

/// [`QueueManager::acquire_pooled`] on the process-wide manager.
pub fn acquire_pooled(device: DeviceIndex, high_priority: bool) -> Result<QueueHandle, QueueError> {
    global()?.acquire_pooled(device, high_priority)
}

/// [`QueueManager::acquire_external`] on the process-wide manager.
pub fn acquire_external(native: NativeQueue, device: DeviceIndex) -> Result<QueueHandle, QueueError> {
    global()?.acquire_external(native, device)
}

/// [`QueueManager::default_queue`] on the process-wide manager.
pub fn default_queue(device: DeviceIndex) -> Result<QueueHandle, QueueError> {
    global()?.default_queue(device)
}

/// [`QueueManager::current_queue`] on the process-wide manager.
pub fn current_queue(device: DeviceIndex) -> Result<QueueHandle, QueueError> {
    global()?.current_queue(device)
}

/// [`QueueManager::set_current_queue`] on the process-wide manager.
pub fn set_current_queue(handle: QueueHandle) -> Result<(), QueueError> {
    global()?.set_current_queue(handle)
}

/// [`QueueManager::scoped`] on the process-wide manager.
pub fn scoped(handle: QueueHandle) -> Result<ScopedQueueGuard<'static>, QueueError> {
    global()?.scoped(handle)
}
