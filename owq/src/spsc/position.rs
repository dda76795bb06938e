//! Packed ring positions: a slot index plus one disambiguation flag.
//!
//! Both ring indices are stored as a single `usize` whose top bit is reserved.
//! The low bits select the slot; the top bit exists only to tell the two
//! index-equal states apart:
//!
//! ```text
//! head == tail                              -> empty
//! head.index() == tail.index(), head != tail -> full (flags disagree)
//! otherwise                                 -> partially occupied
//! ```
//!
//! The producer sets the flag on `tail` when its enqueue lands on the
//! consumer's index; the consumer clears the distinction again by copying
//! `tail` verbatim when its dequeue catches up with the producer.

/// A slot index tagged with the disambiguation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Position(usize);

impl Position {
    /// The reserved disambiguation bit.
    pub const FLAG: usize = 1 << (usize::BITS - 1);

    /// Largest capacity whose indices never reach [`Self::FLAG`].
    pub const MAX_CAPACITY: usize = Self::FLAG - 1;

    /// The empty starting position: index 0, flag clear.
    pub const ZERO: Self = Self(0);

    /// Creates an unflagged position at `index`.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        debug_assert!(index & Self::FLAG == 0);
        Self(index)
    }

    /// Reinterprets a raw atomic word.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw word as stored in the atomic index.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// Slot index with the flag masked off.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 & !Self::FLAG
    }

    #[inline]
    #[must_use]
    pub const fn is_flagged(self) -> bool {
        self.0 & Self::FLAG != 0
    }

    /// Same index with the flag set.
    #[inline]
    #[must_use]
    pub const fn flagged(self) -> Self {
        Self(self.0 | Self::FLAG)
    }
}

/// Next slot index after `index`, wrapping to 0 at `capacity`.
///
/// Equivalent to `(index + 1) % capacity` without the division.
#[inline]
#[must_use]
pub const fn advance(index: usize, capacity: usize) -> usize {
    let next = index + 1;
    if next == capacity { 0 } else { next }
}

/// Both indices agree bit for bit.
#[inline]
#[must_use]
pub const fn is_empty(head: Position, tail: Position) -> bool {
    head.0 == tail.0
}

/// Indices point at the same slot but the flags disagree.
#[inline]
#[must_use]
pub const fn is_full(head: Position, tail: Position) -> bool {
    head.index() == tail.index() && head.0 != tail.0
}

/// Number of occupied slots described by a `(head, tail)` pair.
#[inline]
#[must_use]
pub const fn occupancy(head: Position, tail: Position, capacity: usize) -> usize {
    if is_empty(head, tail) {
        0
    } else if is_full(head, tail) {
        capacity
    } else if tail.index() > head.index() {
        tail.index() - head.index()
    } else {
        capacity - head.index() + tail.index()
    }
}
