//! Queue error types.
//!
//! `QueueFull` and `QueueEmpty` are the ordinary "try again" outcomes of the
//! two queue operations. `ConstructionError` is the only fatal error and is
//! raised before a queue exists.

use thiserror::Error;

use crate::spsc::position::Position;

/// Returned by `enqueue` when every slot is occupied.
///
/// Carries the rejected value so the producer can retry without cloning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is full")]
pub struct QueueFull<T>(pub T);

impl<T> QueueFull<T> {
    /// Recovers the value that could not be enqueued.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Returned by `dequeue` when no slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is empty")]
pub struct QueueEmpty;

/// The backing storage cannot form a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// A queue needs at least one slot.
    #[error("queue capacity must be greater than 0")]
    ZeroCapacity,
    /// The capacity would collide with the reserved disambiguation bit.
    #[error("queue capacity {capacity} exceeds the maximum of {max}")]
    CapacityTooLarge { capacity: usize, max: usize },
}

impl ConstructionError {
    /// Validates a requested capacity.
    pub(crate) const fn check(capacity: usize) -> Result<(), Self> {
        if capacity == 0 {
            Err(Self::ZeroCapacity)
        } else if capacity > Position::MAX_CAPACITY {
            Err(Self::CapacityTooLarge {
                capacity,
                max: Position::MAX_CAPACITY,
            })
        } else {
            Ok(())
        }
    }
}
