//! Core lock-free SPSC ring buffer algorithm.
//!
//! The ring is a fixed array of slots plus two packed [`Position`]s:
//!
//! - `tail` is the write position, stored only by the producer
//! - `head` is the read position, stored only by the consumer
//!
//! Empty and full both have equal slot indices; the top bit of each position
//! tells them apart (see [`super::position`]). No counter, no CAS.
//!
//! # Ordering
//!
//! ```text
//! producer: write slot, Release-store tail  ->  consumer: Acquire-load tail, read slot
//! consumer: read slot, Release-store head   ->  producer: Acquire-load head, write slot
//! ```
//!
//! Each index has a single writer, so its owner may load it `Relaxed`.
//!
//! # Safety
//!
//! `enqueue` and `dequeue` are unsafe because the caller must uphold the SPSC
//! invariant: at most one thread enqueues and at most one thread dequeues at
//! any time. [`crate::sync::spsc`] enforces this with its handle types.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use super::position::{self, Position};
use crate::error::{ConstructionError, QueueEmpty, QueueFull};

/// Producer-side state: the write position.
#[repr(C)]
#[repr(align(64))]
pub struct ProducerState {
    /// Packed write position. Stored by the producer, loaded by the consumer.
    pub tail: AtomicUsize,
}

impl ProducerState {
    pub const fn new() -> Self {
        Self {
            tail: AtomicUsize::new(Position::ZERO.raw()),
        }
    }
}

impl Default for ProducerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer-side state: the read position.
#[repr(C)]
#[repr(align(64))]
pub struct ConsumerState {
    /// Packed read position. Stored by the consumer, loaded by the producer.
    pub head: AtomicUsize,
}

impl ConsumerState {
    pub const fn new() -> Self {
        Self {
            head: AtomicUsize::new(Position::ZERO.raw()),
        }
    }
}

impl Default for ConsumerState {
    fn default() -> Self {
        Self::new()
    }
}

/// A single slot in the ring buffer.
///
/// Ownership of the value alternates between producer and consumer through
/// the index protocol; the slot itself carries no synchronization.
#[repr(transparent)]
pub struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Occupancy class of a ring, derived from one `(head, tail)` snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueState {
    Empty,
    /// Between one and `capacity - 1` elements.
    Partial,
    Full,
}

impl QueueState {
    #[must_use]
    pub const fn of(head: Position, tail: Position) -> Self {
        if position::is_empty(head, tail) {
            Self::Empty
        } else if position::is_full(head, tail) {
            Self::Full
        } else {
            Self::Partial
        }
    }
}

/// Heap-backed ring buffer shared by one producer and one consumer.
#[repr(C)]
pub struct Ring<T> {
    /// Producer state (tail).
    producer: ProducerState,

    /// Consumer state (head).
    consumer: ConsumerState,

    /// Ring buffer slots. Never resized.
    buffer: Box<[Slot<T>]>,
}

impl<T> Ring<T> {
    /// Allocates a ring with `capacity` slots.
    ///
    /// # Errors
    ///
    /// [`ConstructionError`] if `capacity` is zero or collides with the
    /// reserved position bit. Nothing is allocated in that case.
    pub fn with_capacity(capacity: usize) -> Result<Self, ConstructionError> {
        ConstructionError::check(capacity)?;
        Self::from_storage(Box::new_uninit_slice(capacity))
    }

    /// Builds a ring over caller-supplied storage; its length is the capacity.
    ///
    /// The previous contents of `storage` are treated as uninitialized and
    /// are never read.
    ///
    /// # Errors
    ///
    /// [`ConstructionError`] if `storage` is empty or too long.
    pub fn from_storage(storage: Box<[MaybeUninit<T>]>) -> Result<Self, ConstructionError> {
        ConstructionError::check(storage.len())?;

        let raw = Box::into_raw(storage) as *mut [Slot<T>];
        // SAFETY: Slot<T> is repr(transparent) over UnsafeCell<MaybeUninit<T>>,
        // which is repr(transparent) over MaybeUninit<T>. The slice cast keeps
        // the length, and the allocation layout is identical.
        let buffer = unsafe { Box::from_raw(raw) };

        Ok(Self {
            producer: ProducerState::new(),
            consumer: ConsumerState::new(),
            buffer,
        })
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Current read position.
    #[inline]
    #[must_use]
    pub fn head(&self) -> Position {
        Position::from_raw(self.consumer.head.load(Ordering::Acquire))
    }

    /// Current write position.
    #[inline]
    #[must_use]
    pub fn tail(&self) -> Position {
        Position::from_raw(self.producer.tail.load(Ordering::Acquire))
    }

    /// Classifies one snapshot of both positions.
    ///
    /// Under concurrent use the answer may already be stale when returned.
    #[inline]
    #[must_use]
    pub fn state(&self) -> QueueState {
        let head = self.head();
        let tail = self.tail();
        QueueState::of(head, tail)
    }

    /// Occupied slots in one snapshot of both positions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        let head = self.head();
        let tail = self.tail();
        position::occupancy(head, tail, self.capacity())
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state() == QueueState::Empty
    }

    /// Attempts to enqueue a value.
    ///
    /// # Errors
    ///
    /// Returns [`QueueFull`] carrying `value` if every slot is occupied.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread calls this method at a time
    /// (single producer).
    #[inline]
    pub unsafe fn enqueue(&self, value: T) -> Result<(), QueueFull<T>> {
        // Only the producer stores tail
        let tail = Position::from_raw(self.producer.tail.load(Ordering::Relaxed));
        // Pairs with the consumer's Release store: slots it freed are done being read
        let head = Position::from_raw(self.consumer.head.load(Ordering::Acquire));

        let slot_index = tail.index();
        if position::is_full(head, tail) {
            return Err(QueueFull(value));
        }

        // SAFETY: The producer owns the slot at `slot_index` because:
        // - The check above ensures the ring is not full, so this slot is not
        //   between head and tail and the consumer will not read it
        // - tail hasn't been published yet (store happens after this write)
        // - slot_index < capacity per the position invariant
        unsafe {
            let slot_ptr = self.buffer[slot_index].value.get();
            std::ptr::write(slot_ptr, MaybeUninit::new(value));
        }

        let next = position::advance(slot_index, self.capacity());
        let published = if next == head.index() && !head.is_flagged() {
            // This enqueue fills the ring: flags must now disagree
            Position::from_index(head.index()).flagged()
        } else {
            Position::from_index(next)
        };

        // Publish the new tail (release to sync with consumer)
        self.producer.tail.store(published.raw(), Ordering::Release);

        Ok(())
    }

    /// Attempts to dequeue the oldest value.
    ///
    /// # Errors
    ///
    /// Returns [`QueueEmpty`] if no slot is occupied. Neither position is
    /// modified in that case.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread calls this method at a time
    /// (single consumer).
    #[inline]
    pub unsafe fn dequeue(&self) -> Result<T, QueueEmpty> {
        // Only the consumer stores head
        let head = Position::from_raw(self.consumer.head.load(Ordering::Relaxed));
        // Pairs with the producer's Release store: the slot write is visible
        let tail = Position::from_raw(self.producer.tail.load(Ordering::Acquire));

        if position::is_empty(head, tail) {
            return Err(QueueEmpty);
        }

        let slot_index = head.index();

        // SAFETY: The consumer owns the slot at `slot_index` because:
        // - The check above ensures head != tail, so there's data to read
        // - head hasn't been published yet (store happens after this read)
        // - The producer won't overwrite this slot until we publish the new head
        // - The slot was initialized by the producer before its Release store
        //   of tail, which our Acquire load observed
        let value = unsafe {
            let slot_ptr = self.buffer[slot_index].value.get();
            std::ptr::read(slot_ptr).assume_init()
        };

        let next = position::advance(slot_index, self.capacity());
        let published = if next == tail.index() {
            // Caught up with the producer: copy its flag so head == tail
            tail
        } else {
            Position::from_index(next)
        };

        // Publish the new head (release to sync with producer)
        self.consumer.head.store(published.raw(), Ordering::Release);

        Ok(value)
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        if !std::mem::needs_drop::<T>() {
            return;
        }
        // SAFETY: `&mut self` rules out any concurrent producer or consumer.
        while unsafe { self.dequeue() }.is_ok() {}
    }
}

// SAFETY: Ring is Send because all fields are Send when T is Send.
unsafe impl<T: Send> Send for Ring<T> {}

// SAFETY: Ring is Sync because concurrent access is mediated by atomics:
// - head/tail are AtomicUsize with Release/Acquire ordering
// - Buffer slots are protected by the SPSC invariant (see Slot)
unsafe impl<T: Send> Sync for Ring<T> {}
