//! Queue priority normalization.
//!
//! The accelerator runtime numbers priorities the other way round from the
//! rest of the ecosystem: its least urgent priority is `1` and its most urgent
//! is `0`. qpool exposes the conventional scale instead, where `0` is normal
//! and more negative values are more urgent. The mapping is a fixed shift by
//! the least-urgent native value, so the reference runtime maps `[1, 0]` to
//! `[0, -1]`.

use crate::error::QueueError;
use crate::handle::QueueClass;

/// Native priority bounds reported by a runtime, with the mapping to the
/// normalized scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativePriorityRange {
    least: i32,
    greatest: i32,
}

impl NativePriorityRange {
    /// Validate bounds against the reference runtime convention.
    ///
    /// The least urgent priority must be at least `1` and the most urgent at
    /// most `0`; anything else means the runtime is not the one this mapping
    /// was written for.
    pub fn new(least: i32, greatest: i32) -> Result<Self, QueueError> {
        if least < 1 || greatest > 0 {
            return Err(QueueError::PriorityRange { least, greatest });
        }
        Ok(Self { least, greatest })
    }

    /// Accept bounds from a runtime with its own convention.
    ///
    /// Only the ordering `least >= greatest` is required.
    pub fn with_convention(least: i32, greatest: i32) -> Result<Self, QueueError> {
        if least < greatest {
            return Err(QueueError::PriorityRange { least, greatest });
        }
        Ok(Self { least, greatest })
    }

    /// Least urgent native priority.
    pub fn least(&self) -> i32 {
        self.least
    }

    /// Most urgent native priority.
    pub fn greatest(&self) -> i32 {
        self.greatest
    }

    /// Map a native priority onto the normalized scale.
    pub fn normalize(&self, native: i32) -> i32 {
        native - self.least
    }

    /// Normalized `(min, max)` bounds: `0` for normal, negative for urgent.
    pub fn normalized_bounds(&self) -> (i32, i32) {
        (self.normalize(self.least), self.normalize(self.greatest))
    }

    /// Native priority used when constructing queues of a pool class.
    pub fn native_for(&self, class: QueueClass) -> i32 {
        match class {
            QueueClass::Normal => self.least,
            QueueClass::High => self.greatest,
        }
    }
}
