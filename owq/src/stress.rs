//! Two-thread stress harness: the correctness oracle for the queue.
//!
//! One run builds a fresh channel, spawns one producer and one consumer
//! thread, and pushes `count` values of a known [`Sequence`] through it:
//!
//! - The producer retries on [`QueueFull`] with a spin-then-sleep backoff and
//!   raises the termination signal after its last successful enqueue.
//! - The consumer checks every value against the next expected one. A
//!   mismatch ends the run immediately.
//! - Either side gives up after too many consecutive failures (the liveness
//!   bound) and halts the other side.
//!
//! Runs come in two tiers: a [`Tier::Short`] queue that crosses the
//! full/empty boundary constantly, and a [`Tier::Long`] one that measures
//! sustained throughput.

use std::fmt;
use std::hint;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use minstant::Instant;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ConstructionError, QueueEmpty, QueueFull};
use crate::placement::{CpuConfig, pin_to_core};
use crate::sync::spsc::{self, Consumer, Producer};
use crate::trace::{debug, error, info, warn};

/// Slots in a short-tier queue.
pub const SHORT_CAPACITY: usize = 10;

/// Slots in a long-tier queue.
pub const LONG_CAPACITY: usize = 1024 * 1024;

/// Default number of values pushed through per run.
pub const DEFAULT_COUNT: u64 = 1024 * 1024;

/// Values the producer generates and the consumer predicts.
///
/// Both sides walk the same deterministic sequence, so equality of the
/// dequeued value with the locally computed one proves FIFO delivery.
pub trait Sequence: Copy + PartialEq + fmt::Debug + Send + 'static {
    fn first() -> Self;

    #[must_use]
    fn next(self) -> Self;
}

macro_rules! impl_integer_sequence {
    ($($t:ty),* $(,)?) => {
        $(
            impl Sequence for $t {
                fn first() -> Self {
                    0
                }

                fn next(self) -> Self {
                    self.wrapping_add(1)
                }
            }
        )*
    };
}

impl_integer_sequence!(i32, i64, u32, u64, usize);

macro_rules! impl_float_sequence {
    ($($t:ty),* $(,)?) => {
        $(
            impl Sequence for $t {
                fn first() -> Self {
                    0.0
                }

                fn next(self) -> Self {
                    self + 1.1
                }
            }
        )*
    };
}

impl_float_sequence!(f32, f64);

/// Queue size class of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Constant full/empty boundary crossings.
    Short,
    /// Sustained throughput.
    Long,
}

impl Tier {
    #[must_use]
    pub const fn capacity(self) -> usize {
        match self {
            Self::Short => SHORT_CAPACITY,
            Self::Long => LONG_CAPACITY,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => f.write_str("Shortq"),
            Self::Long => f.write_str("Longq"),
        }
    }
}

/// Which thread of a run an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Producer,
    Consumer,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => f.write_str("producer"),
            Self::Consumer => f.write_str("consumer"),
        }
    }
}

/// Parameters of one stress run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressConfig {
    /// Name used in reports and errors.
    pub label: String,
    /// Queue slots.
    pub capacity: usize,
    /// Successful enqueues the producer performs.
    pub count: u64,
    /// Consecutive producer failures before it starts sleeping.
    pub producer_spin_limit: u32,
    /// Consecutive consumer failures before it starts sleeping.
    pub consumer_spin_limit: u32,
    /// Liveness bound for the producer; the consumer allows twice as many.
    pub max_failures: u32,
    /// Empty reads the consumer tolerates after the termination signal.
    pub drain_grace: u32,
    /// Sleep between failures once past the spin limit.
    pub backoff: Duration,
    /// Thread pinning.
    pub placement: CpuConfig,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            label: String::from("owq"),
            capacity: SHORT_CAPACITY,
            count: DEFAULT_COUNT,
            producer_spin_limit: 10_000,
            consumer_spin_limit: 1_000,
            max_failures: 100_000,
            drain_grace: 5,
            backoff: Duration::from_micros(1),
            placement: CpuConfig::default(),
        }
    }
}

impl StressConfig {
    /// Default parameters for `tier`, labelled `label`.
    #[must_use]
    pub fn tier(tier: Tier, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            capacity: tier.capacity(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn short(label: impl Into<String>) -> Self {
        Self::tier(Tier::Short, label)
    }

    #[must_use]
    pub fn long(label: impl Into<String>) -> Self {
        Self::tier(Tier::Long, label)
    }

    #[must_use]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    #[must_use]
    pub fn with_placement(mut self, placement: CpuConfig) -> Self {
        self.placement = placement;
        self
    }
}

/// How a thread left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exit {
    /// Reached the configured count.
    Completed,
    /// Gave up early after `count` operations.
    Premature { count: u64 },
    /// Stopped because the other side failed.
    Halted,
}

/// Outcome of a run that saw no correctness or liveness failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressReport {
    pub label: String,
    pub capacity: usize,
    /// Wall-clock time from thread spawn to both threads joined.
    pub elapsed: Duration,
    pub enqueued: u64,
    pub dequeued: u64,
    pub producer: Exit,
    pub consumer: Exit,
}

impl StressReport {
    /// Both threads completed the full count.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.producer == Exit::Completed && self.consumer == Exit::Completed
    }

    /// Values delivered per millisecond.
    #[must_use]
    pub fn throughput_per_ms(&self) -> u128 {
        let nanos = self.elapsed.as_nanos().max(1);
        u128::from(self.dequeued) * 1_000_000 / nanos
    }
}

/// Fatal outcomes of a stress run.
#[derive(Debug, Error)]
pub enum StressError {
    /// The queue could not be built.
    #[error("cannot build queue: {0}")]
    Construction(#[from] ConstructionError),
    /// The OS refused to start a thread.
    #[error("failed to spawn {side} thread: {source}")]
    Spawn {
        side: Side,
        #[source]
        source: io::Error,
    },
    /// One side exceeded its liveness bound.
    #[error("{label}: {side} stalled after {progress} operations ({failures} consecutive failures)")]
    Stalled {
        label: String,
        side: Side,
        progress: u64,
        failures: u32,
    },
    /// The consumer saw a value out of order, duplicated, or lost.
    #[error("{label}: sequence error at position {position}: expected {expected}, observed {observed}")]
    SequenceViolation {
        label: String,
        position: u64,
        expected: String,
        observed: String,
    },
    /// A thread panicked.
    #[error("{label}: {side} thread panicked")]
    Panicked { label: String, side: Side },
}

/// Cross-thread run control.
#[derive(Default)]
struct Signal {
    /// Producer finished its last enqueue.
    done: AtomicBool,
    /// One side failed; the other should stop.
    halted: AtomicBool,
}

impl Signal {
    fn finish(&self) {
        self.done.store(true, Ordering::Release);
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

/// Counts consecutive failures; spins until `spin_limit`, then sleeps.
struct Backoff {
    failures: u32,
    spin_limit: u32,
    pause: Duration,
}

impl Backoff {
    const fn new(spin_limit: u32, pause: Duration) -> Self {
        Self {
            failures: 0,
            spin_limit,
            pause,
        }
    }

    fn reset(&mut self) {
        self.failures = 0;
    }

    /// Records a failure, waits, and returns the consecutive failure count.
    fn fail(&mut self) -> u32 {
        self.failures = self.failures.saturating_add(1);
        if self.failures > self.spin_limit {
            thread::sleep(self.pause);
        } else {
            hint::spin_loop();
        }
        self.failures
    }
}

/// What a thread reports after leaving its loop.
struct Outcome {
    exit: Exit,
    operations: u64,
}

/// Runs one producer/consumer pair over a fresh queue.
///
/// # Errors
///
/// Returns [`StressError`] on a construction failure, a thread spawn
/// failure, a sequence violation, a liveness violation, or a thread panic.
pub fn run<T: Sequence>(config: &StressConfig) -> Result<StressReport, StressError> {
    let (producer, consumer) = spsc::channel::<T>(config.capacity)?;
    let placement = config.placement.resolve();
    let signal = Signal::default();
    let signal = &signal;

    info!(
        label = %config.label,
        capacity = config.capacity,
        count = config.count,
        "starting stress run"
    );

    let start = Instant::now();

    let (produced, consumed) = thread::scope(|scope| -> Result<_, StressError> {
        let producer_handle = thread::Builder::new()
            .name(String::from("owq-producer"))
            .spawn_scoped(scope, move || {
                if let Some(core) = placement.producer_core {
                    pin(core, Side::Producer);
                }
                produce(&producer, config, signal)
            })
            .map_err(|source| StressError::Spawn {
                side: Side::Producer,
                source,
            })?;

        let consumer_handle = match thread::Builder::new()
            .name(String::from("owq-consumer"))
            .spawn_scoped(scope, move || {
                if let Some(core) = placement.consumer_core {
                    pin(core, Side::Consumer);
                }
                consume(&consumer, config, signal)
            }) {
            Ok(handle) => handle,
            Err(source) => {
                // The producer would otherwise run into its liveness bound.
                signal.halt();
                return Err(StressError::Spawn {
                    side: Side::Consumer,
                    source,
                });
            }
        };

        let panicked = |side| StressError::Panicked {
            label: config.label.clone(),
            side,
        };
        let produced = producer_handle.join().map_err(|_| panicked(Side::Producer));
        let consumed = consumer_handle.join().map_err(|_| panicked(Side::Consumer));
        Ok((produced?, consumed?))
    })?;

    let elapsed = start.elapsed();

    // Prefer the consumer's verdict: a sequence violation explains a stall.
    let (produced, consumed) = match (produced, consumed) {
        (_, Err(e)) | (Err(e), _) => return Err(e),
        (Ok(produced), Ok(consumed)) => (produced, consumed),
    };

    let report = StressReport {
        label: config.label.clone(),
        capacity: config.capacity,
        elapsed,
        enqueued: produced.operations,
        dequeued: consumed.operations,
        producer: produced.exit,
        consumer: consumed.exit,
    };

    info!(
        label = %report.label,
        elapsed_ms = report.elapsed.as_millis() as u64,
        clean = report.is_clean(),
        "stress run finished"
    );

    Ok(report)
}

fn pin(core: usize, side: Side) {
    if pin_to_core(core) {
        debug!(%side, core, "pinned thread");
    } else {
        warn!(%side, core, "failed to pin thread");
    }
}

fn produce<T: Sequence>(
    producer: &Producer<T>,
    config: &StressConfig,
    signal: &Signal,
) -> Result<Outcome, StressError> {
    let mut value = T::first();
    let mut enqueued = 0u64;
    let mut backoff = Backoff::new(config.producer_spin_limit, config.backoff);

    while enqueued < config.count {
        match producer.enqueue(value) {
            Ok(()) => {
                enqueued += 1;
                value = value.next();
                backoff.reset();
            }
            Err(QueueFull(_)) => {
                if signal.is_halted() {
                    return Ok(Outcome {
                        exit: Exit::Halted,
                        operations: enqueued,
                    });
                }
                let failures = backoff.fail();
                if failures >= config.max_failures {
                    signal.halt();
                    warn!(label = %config.label, enqueued, failures, "producer oversleeps");
                    return Err(StressError::Stalled {
                        label: config.label.clone(),
                        side: Side::Producer,
                        progress: enqueued,
                        failures,
                    });
                }
            }
        }
    }

    signal.finish();
    debug!(label = %config.label, enqueued, "producer done");

    Ok(Outcome {
        exit: Exit::Completed,
        operations: enqueued,
    })
}

fn consume<T: Sequence>(
    consumer: &Consumer<T>,
    config: &StressConfig,
    signal: &Signal,
) -> Result<Outcome, StressError> {
    let mut expected = T::first();
    let mut dequeued = 0u64;
    let mut grace = 0u32;
    let mut backoff = Backoff::new(config.consumer_spin_limit, config.backoff);
    let liveness_bound = config.max_failures.saturating_mul(2);

    while dequeued < config.count {
        match consumer.dequeue() {
            Ok(value) => {
                if value != expected {
                    signal.halt();
                    error!(
                        label = %config.label,
                        position = dequeued,
                        expected = ?expected,
                        observed = ?value,
                        "sequence error"
                    );
                    return Err(StressError::SequenceViolation {
                        label: config.label.clone(),
                        position: dequeued,
                        expected: format!("{expected:?}"),
                        observed: format!("{value:?}"),
                    });
                }
                expected = expected.next();
                dequeued += 1;
                backoff.reset();
            }
            Err(QueueEmpty) => {
                if signal.is_halted() {
                    return Ok(Outcome {
                        exit: Exit::Halted,
                        operations: dequeued,
                    });
                }
                if signal.is_done() {
                    grace += 1;
                    if grace >= config.drain_grace {
                        warn!(label = %config.label, dequeued, "consumer exits early");
                        return Ok(Outcome {
                            exit: Exit::Premature { count: dequeued },
                            operations: dequeued,
                        });
                    }
                }
                let failures = backoff.fail();
                if failures >= liveness_bound {
                    signal.halt();
                    warn!(label = %config.label, dequeued, failures, "consumer oversleeps");
                    return Err(StressError::Stalled {
                        label: config.label.clone(),
                        side: Side::Consumer,
                        progress: dequeued,
                        failures,
                    });
                }
            }
        }
    }

    Ok(Outcome {
        exit: Exit::Completed,
        operations: dequeued,
    })
}
