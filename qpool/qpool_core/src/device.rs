//! Device identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::QueueError;

/// Index of an accelerator device within the process.
///
/// Valid devices are numbered from zero. Negative values are only meaningful
/// as the [`CURRENT_DEVICE`] sentinel accepted by lookup operations.
pub type DeviceIndex = i8;

/// Sentinel device index meaning "the device currently active on this thread".
pub const CURRENT_DEVICE: DeviceIndex = -1;

/// Kind of device a queue belongs to.
///
/// Only [`DeviceKind::Accelerator`] queues are managed by qpool; the other
/// kind exists so that packed references coming from elsewhere can be
/// recognised and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i8)]
pub enum DeviceKind {
    /// Host CPU.
    Cpu = 0,

    /// Accelerator device driven through a [`QueueRuntime`](crate::runtime::QueueRuntime).
    Accelerator = 1,
}

impl DeviceKind {
    /// Get the name of this device kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Accelerator => "accelerator",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<DeviceKind> for i8 {
    fn from(kind: DeviceKind) -> Self {
        kind as i8
    }
}

impl TryFrom<i8> for DeviceKind {
    type Error = QueueError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Cpu),
            1 => Ok(Self::Accelerator),
            other => Err(QueueError::UnknownDeviceKind(other)),
        }
    }
}
