//! Lock-free SPSC queue for in-process (inter-thread) communication.
//!
//! A wait-free bounded queue using a heap-allocated ring buffer with two
//! flag-tagged atomic indices.
//!
//! # Overview
//!
//! - [`Producer`] - Write end (single producer per queue)
//! - [`Consumer`] - Read end (single consumer per queue)
//! - Lock-free, wait-free: no mutexes, no CAS, no syscalls
//! - Non-blocking: a full or empty queue is reported, never waited on
//!
//! # Example
//!
//! ```
//! use owq::sync::spsc;
//! use owq::QueueEmpty;
//!
//! let (producer, consumer) = spsc::channel::<u64>(1024)?;
//!
//! // Producer thread
//! producer.enqueue(42).expect("Queue full");
//!
//! // Consumer thread
//! assert_eq!(consumer.dequeue(), Ok(42));
//! assert_eq!(consumer.dequeue(), Err(QueueEmpty));
//! # Ok::<(), owq::ConstructionError>(())
//! ```
//!
//! # Thread safety
//!
//! Each handle is [`Send`] but not [`Sync`] and not [`Clone`], so exactly one
//! thread can enqueue and exactly one can dequeue:
//!
//! ```compile_fail
//! fn assert_sync<T: Sync>() {}
//! assert_sync::<owq::sync::spsc::Producer<u64>>();
//! ```

use std::cell::Cell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::Arc;

use crate::error::{ConstructionError, QueueEmpty, QueueFull};
use crate::spsc::ring::{QueueState, Ring};

/// Marker type to opt-out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Write end of the SPSC queue.
pub struct Producer<T: Send> {
    ring: Arc<Ring<T>>,
    _unsync: PhantomUnsync,
}

/// Read end of the SPSC queue.
///
/// See [`Producer`] for thread safety details (same semantics apply).
pub struct Consumer<T: Send> {
    ring: Arc<Ring<T>>,
    _unsync: PhantomUnsync,
}

/// Creates a new SPSC channel with `capacity` slots.
///
/// Returns a `(Producer, Consumer)` pair. The producer and consumer can be
/// sent to different threads.
///
/// # Errors
///
/// [`ConstructionError`] if `capacity` is zero or too large.
///
/// # Example
///
/// ```
/// use owq::sync::spsc;
///
/// let (tx, rx) = spsc::channel::<String>(16)?;
///
/// tx.enqueue("hello".to_string()).unwrap();
/// assert_eq!(rx.dequeue(), Ok("hello".to_string()));
/// # Ok::<(), owq::ConstructionError>(())
/// ```
pub fn channel<T: Send>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), ConstructionError> {
    Ring::with_capacity(capacity).map(split)
}

/// Creates a new SPSC channel over caller-supplied storage.
///
/// The capacity is `storage.len()`.
///
/// # Errors
///
/// [`ConstructionError`] if `storage` is empty or too long.
pub fn channel_from_storage<T: Send>(
    storage: Box<[MaybeUninit<T>]>,
) -> Result<(Producer<T>, Consumer<T>), ConstructionError> {
    Ring::from_storage(storage).map(split)
}

fn split<T: Send>(ring: Ring<T>) -> (Producer<T>, Consumer<T>) {
    let ring = Arc::new(ring);

    let producer = Producer {
        ring: Arc::clone(&ring),
        _unsync: PhantomData,
    };

    let consumer = Consumer {
        ring,
        _unsync: PhantomData,
    };

    (producer, consumer)
}

impl<T: Send> Producer<T> {
    /// Attempts to enqueue a value (wait-free).
    ///
    /// # Errors
    ///
    /// Returns [`QueueFull`] holding `value` if the queue is full, allowing retry.
    #[inline]
    pub fn enqueue(&self, value: T) -> Result<(), QueueFull<T>> {
        // SAFETY: Only one Producer exists per ring and it is not Sync, so
        // this is the only thread enqueueing.
        unsafe { self.ring.enqueue(value) }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Occupancy class as seen by the producer.
    ///
    /// `Full` may be stale (the consumer can free a slot at any moment);
    /// `Empty` may not, since only the producer adds elements.
    #[inline]
    #[must_use]
    pub fn state(&self) -> QueueState {
        self.ring.state()
    }

    /// Snapshot occupancy; an upper bound from the producer's side.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.state() == QueueState::Full
    }
}

impl<T: Send> Consumer<T> {
    /// Attempts to dequeue the oldest value (wait-free).
    ///
    /// # Errors
    ///
    /// Returns [`QueueEmpty`] if the queue is empty.
    #[inline]
    pub fn dequeue(&self) -> Result<T, QueueEmpty> {
        // SAFETY: Only one Consumer exists per ring and it is not Sync, so
        // this is the only thread dequeueing.
        unsafe { self.ring.dequeue() }
    }

    /// Dequeues until the queue reports empty.
    ///
    /// Values enqueued concurrently may or may not be included.
    pub fn drain(&self) -> Drain<'_, T> {
        Drain { consumer: self }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Occupancy class as seen by the consumer.
    ///
    /// `Empty` may be stale (the producer can publish at any moment);
    /// `Full` may not, since only the consumer removes elements.
    #[inline]
    #[must_use]
    pub fn state(&self) -> QueueState {
        self.ring.state()
    }

    /// Snapshot occupancy; a lower bound from the consumer's side.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.state() == QueueState::Full
    }
}

/// Iterator returned by [`Consumer::drain`].
pub struct Drain<'a, T: Send> {
    consumer: &'a Consumer<T>,
}

impl<T: Send> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.consumer.dequeue().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_enqueue_dequeue() {
        let (producer, consumer) = channel::<u64>(8).unwrap();

        assert!(producer.enqueue(42).is_ok());
        assert_eq!(consumer.dequeue(), Ok(42));
        assert_eq!(consumer.dequeue(), Err(QueueEmpty));
    }

    #[test]
    fn test_multiple_items() {
        let (producer, consumer) = channel::<u64>(16).unwrap();

        for i in 0..10 {
            assert!(producer.enqueue(i).is_ok());
        }

        for i in 0..10 {
            assert_eq!(consumer.dequeue(), Ok(i));
        }

        assert_eq!(consumer.dequeue(), Err(QueueEmpty));
    }

    #[test]
    fn test_queue_full() {
        let (producer, consumer) = channel::<u64>(4).unwrap();

        for i in 0..4 {
            assert!(producer.enqueue(i).is_ok(), "Failed to enqueue item {i}");
        }

        assert_eq!(producer.enqueue(999), Err(QueueFull(999)));

        assert_eq!(consumer.dequeue(), Ok(0));
        assert!(producer.enqueue(4).is_ok());
        assert_eq!(producer.enqueue(1000), Err(QueueFull(1000)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            channel::<u64>(0),
            Err(ConstructionError::ZeroCapacity)
        ));
    }

    #[test]
    fn test_capacity_one_round_trips() {
        let (producer, consumer) = channel::<u32>(1).unwrap();

        for i in 0..1000 {
            assert_eq!(producer.enqueue(i), Ok(()));
            assert_eq!(producer.enqueue(i + 1), Err(QueueFull(i + 1)));
            assert!(producer.is_full());
            assert_eq!(consumer.dequeue(), Ok(i));
            assert_eq!(consumer.dequeue(), Err(QueueEmpty));
            assert!(consumer.is_empty());
        }
    }

    #[test]
    fn test_no_false_full_or_empty() {
        let capacity = 5;
        let (producer, consumer) = channel::<usize>(capacity).unwrap();

        // Several laps so both flag polarities are exercised.
        for lap in 0..4 {
            for n in 0..capacity {
                assert_eq!(producer.len(), n);
                let expected = if n == 0 {
                    QueueState::Empty
                } else {
                    QueueState::Partial
                };
                assert_eq!(producer.state(), expected, "lap {lap}, {n} queued");
                producer.enqueue(lap * 100 + n).unwrap();
            }
            assert_eq!(producer.state(), QueueState::Full);
            assert_eq!(producer.len(), capacity);

            for n in 0..capacity {
                assert_eq!(consumer.dequeue(), Ok(lap * 100 + n));
                let expected = if n + 1 == capacity {
                    QueueState::Empty
                } else {
                    QueueState::Partial
                };
                assert_eq!(consumer.state(), expected, "lap {lap}, {n} dequeued");
            }
        }
    }

    #[test]
    fn test_one_dequeue_frees_exactly_one_slot() {
        let (producer, consumer) = channel::<u32>(3).unwrap();

        for i in 0..3 {
            producer.enqueue(i).unwrap();
        }
        assert_eq!(producer.enqueue(3), Err(QueueFull(3)));

        assert_eq!(consumer.dequeue(), Ok(0));
        assert_eq!(producer.enqueue(3), Ok(()));
        assert_eq!(producer.enqueue(4), Err(QueueFull(4)));
    }

    #[test]
    fn test_wrapping_behavior() {
        let (producer, consumer) = channel::<u64>(4).unwrap();

        for round in 0..5 {
            for i in 0..4 {
                let value = round * 10 + i;
                assert!(producer.enqueue(value).is_ok());
            }

            for i in 0..4 {
                let expected = round * 10 + i;
                assert_eq!(consumer.dequeue(), Ok(expected));
            }

            assert_eq!(consumer.dequeue(), Err(QueueEmpty));
        }
    }

    #[test]
    fn test_interleaved_operations() {
        let (producer, consumer) = channel::<u64>(8).unwrap();

        producer.enqueue(1).unwrap();
        producer.enqueue(2).unwrap();
        assert_eq!(consumer.dequeue(), Ok(1));
        producer.enqueue(3).unwrap();
        assert_eq!(consumer.dequeue(), Ok(2));
        assert_eq!(consumer.dequeue(), Ok(3));
        producer.enqueue(4).unwrap();
        producer.enqueue(5).unwrap();
        assert_eq!(consumer.dequeue(), Ok(4));
        assert_eq!(consumer.dequeue(), Ok(5));
        assert_eq!(consumer.dequeue(), Err(QueueEmpty));
    }

    #[test]
    fn test_caller_storage() {
        let storage = Box::new_uninit_slice(3);
        let (producer, consumer) = channel_from_storage::<f64>(storage).unwrap();

        assert_eq!(producer.capacity(), 3);
        assert_eq!(consumer.capacity(), 3);

        producer.enqueue(0.0).unwrap();
        producer.enqueue(1.1).unwrap();
        assert_eq!(consumer.dequeue(), Ok(0.0));
        assert_eq!(consumer.dequeue(), Ok(1.1));
    }

    #[test]
    fn test_drain() {
        let (producer, consumer) = channel::<u32>(8).unwrap();

        for i in 0..6 {
            producer.enqueue(i).unwrap();
        }

        let drained: Vec<_> = consumer.drain().collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4, 5]);
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_send_to_thread() {
        let (producer, consumer) = channel::<u64>(16).unwrap();

        let handle = std::thread::spawn(move || {
            for i in 0..10 {
                producer.enqueue(i).unwrap();
            }
        });

        handle.join().unwrap();

        for i in 0..10 {
            assert_eq!(consumer.dequeue(), Ok(i));
        }
    }

    #[test]
    fn test_concurrent_enqueue_dequeue() {
        let (producer, consumer) = channel::<u64>(10).unwrap();
        let count = 100_000u64;

        let producer_handle = std::thread::spawn(move || {
            for i in 0..count {
                let mut item = i;
                while let Err(full) = producer.enqueue(item) {
                    item = full.into_inner();
                    std::hint::spin_loop();
                }
            }
        });

        let consumer_handle = std::thread::spawn(move || {
            let mut received = Vec::with_capacity(count as usize);
            while received.len() < count as usize {
                match consumer.dequeue() {
                    Ok(item) => received.push(item),
                    Err(QueueEmpty) => std::hint::spin_loop(),
                }
            }
            received
        });

        producer_handle.join().unwrap();
        let received = consumer_handle.join().unwrap();

        // Verify FIFO order
        for (i, &val) in received.iter().enumerate() {
            assert_eq!(val, i as u64);
        }
    }

    #[test]
    fn test_non_copy_type() {
        let (producer, consumer) = channel::<String>(8).unwrap();

        producer.enqueue("hello".to_string()).unwrap();
        producer.enqueue("world".to_string()).unwrap();

        assert_eq!(consumer.dequeue(), Ok("hello".to_string()));
        assert_eq!(consumer.dequeue(), Ok("world".to_string()));
        assert_eq!(consumer.dequeue(), Err(QueueEmpty));
    }

    #[test]
    fn test_remaining_items_dropped_with_handles() {
        let marker = Arc::new(());
        let (producer, consumer) = channel::<Arc<()>>(4).unwrap();

        producer.enqueue(Arc::clone(&marker)).unwrap();
        producer.enqueue(Arc::clone(&marker)).unwrap();
        assert_eq!(Arc::strong_count(&marker), 3);

        drop(producer);
        assert_eq!(Arc::strong_count(&marker), 3);
        drop(consumer);
        assert_eq!(Arc::strong_count(&marker), 1);
    }
}
