//! # qpool core
//!
//! `qpool_core` provides the value types shared by every qpool component:
//! device and queue identities, the packed cross-boundary queue reference,
//! priority normalization, the error hierarchy, configuration, and the
//! `QueueRuntime` seam onto the accelerator runtime.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all qpool components
//! - **device**: Device indices and device kinds
//! - **handle**: Queue identities, handles and the packed triple
//! - **priority**: Native-to-normalized priority mapping
//! - **runtime**: The accelerator runtime trait and a simulated implementation
//! - **utils**: Configuration loading

pub mod device;
pub mod error;
pub mod handle;
pub mod priority;
pub mod runtime;
pub mod utils;

pub use device::{DeviceIndex, DeviceKind, CURRENT_DEVICE};
pub use error::{ConfigError, Error, QueueError, Result};
pub use handle::{PackedQueue, QueueClass, QueueHandle, QueueId};
pub use priority::NativePriorityRange;
pub use runtime::{NativeQueue, QueueRuntime, QueueStatus, RuntimeFault, SimulatedConfig, SimulatedRuntime};
pub use utils::QueuePoolConfig;
