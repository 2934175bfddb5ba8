//! Queue identities and handles.
//!
//! A [`QueueHandle`] is a small `Copy` value naming one logical device queue.
//! It never owns the native queue: pooled queues belong to the pool registry
//! for the life of the process and external queues belong to whoever created
//! them. Two handles with equal fields denote the same queue.
//!
//! The queue identity is packed into a single `u64` ([`QueueId`]):
//!
//! ```text
//! external:  1 | native handle (63 bits)
//! pooled:    0 | slot index (62 bits) | class (1 bit)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::device::{DeviceIndex, DeviceKind};
use crate::error::QueueError;
use crate::runtime::NativeQueue;

const EXTERNAL_BIT: u64 = 1 << 63;
const CLASS_BITS: u32 = 1;
const CLASS_MASK: u64 = (1 << CLASS_BITS) - 1;

/// Priority class of a pooled queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueClass {
    /// Normal-priority pool
    Normal = 0,

    /// High-priority pool
    High = 1,
}

impl QueueClass {
    /// Pick the class matching a high-priority request flag.
    pub fn from_high_priority(high_priority: bool) -> Self {
        if high_priority {
            Self::High
        } else {
            Self::Normal
        }
    }

    /// Get the name of this class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl fmt::Display for QueueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque 64-bit queue identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(u64);

impl QueueId {
    /// Identity of a pooled slot.
    pub fn pooled(class: QueueClass, slot: usize) -> Self {
        Self(((slot as u64) << CLASS_BITS) | class as u64)
    }

    /// Identity of an externally owned native queue.
    ///
    /// Fails if the native handle uses the top bit, which marks external ids.
    pub fn external(native: NativeQueue) -> Result<Self, QueueError> {
        if native.as_raw() & EXTERNAL_BIT != 0 {
            return Err(QueueError::ExternalHandleOutOfRange(native.as_raw()));
        }
        Ok(Self(native.as_raw() | EXTERNAL_BIT))
    }

    /// Rebuild an identity from its raw value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value of this identity.
    pub fn as_raw(&self) -> u64 {
        self.0
    }

    /// Whether this identity names an external queue.
    pub fn is_external(&self) -> bool {
        self.0 & EXTERNAL_BIT != 0
    }

    /// Pool class, for pooled identities.
    pub fn class(&self) -> Option<QueueClass> {
        if self.is_external() {
            return None;
        }
        match self.0 & CLASS_MASK {
            0 => Some(QueueClass::Normal),
            _ => Some(QueueClass::High),
        }
    }

    /// Slot index, for pooled identities.
    pub fn slot(&self) -> Option<usize> {
        if self.is_external() {
            None
        } else {
            Some((self.0 >> CLASS_BITS) as usize)
        }
    }

    /// Native handle, for external identities.
    pub fn native(&self) -> Option<NativeQueue> {
        if self.is_external() {
            Some(NativeQueue::from_raw(self.0 & !EXTERNAL_BIT))
        } else {
            None
        }
    }
}

/// Non-owning reference to one logical device queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueHandle {
    device_index: DeviceIndex,
    queue_id: QueueId,
    device_kind: DeviceKind,
}

impl QueueHandle {
    /// Handle for a pooled slot on an accelerator device.
    pub fn pooled(device_index: DeviceIndex, class: QueueClass, slot: usize) -> Self {
        Self {
            device_index,
            queue_id: QueueId::pooled(class, slot),
            device_kind: DeviceKind::Accelerator,
        }
    }

    /// Handle wrapping an externally owned native queue.
    pub fn external(native: NativeQueue, device_index: DeviceIndex) -> Result<Self, QueueError> {
        Ok(Self {
            device_index,
            queue_id: QueueId::external(native)?,
            device_kind: DeviceKind::Accelerator,
        })
    }

    /// Device this queue belongs to.
    pub fn device_index(&self) -> DeviceIndex {
        self.device_index
    }

    /// Kind of the device this queue belongs to.
    pub fn device_kind(&self) -> DeviceKind {
        self.device_kind
    }

    /// Opaque queue identity.
    pub fn id(&self) -> QueueId {
        self.queue_id
    }

    /// Whether the queue is owned outside the pool registry.
    pub fn is_external(&self) -> bool {
        self.queue_id.is_external()
    }

    /// Pool class, for pooled queues.
    pub fn class(&self) -> Option<QueueClass> {
        self.queue_id.class()
    }

    /// Pool slot, for pooled queues.
    pub fn slot(&self) -> Option<usize> {
        self.queue_id.slot()
    }

    /// Flatten this handle into a copyable triple.
    pub fn pack(&self) -> PackedQueue {
        PackedQueue {
            queue_id: self.queue_id,
            device_index: self.device_index,
            device_kind: self.device_kind,
        }
    }

    /// Rebuild a handle from a packed triple.
    ///
    /// This only restores the value; it does not touch the native queue.
    /// Use the queue manager's `unpack` to also confirm that the identity
    /// resolves to an existing queue.
    pub fn unpack(packed: PackedQueue) -> Result<Self, QueueError> {
        if packed.device_kind != DeviceKind::Accelerator {
            return Err(QueueError::WrongDeviceKind(packed.device_kind));
        }
        Ok(Self {
            device_index: packed.device_index,
            queue_id: packed.queue_id,
            device_kind: packed.device_kind,
        })
    }
}

impl fmt::Display for QueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.queue_id.native(), self.queue_id.class(), self.queue_id.slot()) {
            (Some(native), _, _) => write!(
                f,
                "queue{{device={}, external={:#x}}}",
                self.device_index,
                native.as_raw()
            ),
            (None, Some(class), Some(slot)) => write!(
                f,
                "queue{{device={}, class={}, slot={}}}",
                self.device_index, class, slot
            ),
            _ => write!(
                f,
                "queue{{device={}, id={:#x}}}",
                self.device_index,
                self.queue_id.as_raw()
            ),
        }
    }
}

/// Flat cross-boundary form of a [`QueueHandle`].
///
/// Only meaningful inside the process that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackedQueue {
    /// Queue identity
    pub queue_id: QueueId,

    /// Device index
    pub device_index: DeviceIndex,

    /// Device kind
    pub device_kind: DeviceKind,
}

impl PackedQueue {
    /// Split into raw primitives.
    pub fn into_raw(self) -> (u64, DeviceIndex, i8) {
        (
            self.queue_id.as_raw(),
            self.device_index,
            self.device_kind.into(),
        )
    }

    /// Rebuild from raw primitives, rejecting unknown device kind tags.
    pub fn from_raw(queue_id: u64, device_index: DeviceIndex, device_kind: i8) -> Result<Self, QueueError> {
        Ok(Self {
            queue_id: QueueId::from_raw(queue_id),
            device_index,
            device_kind: DeviceKind::try_from(device_kind)?,
        })
    }
}
