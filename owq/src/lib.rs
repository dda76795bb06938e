//! Lock-free bounded one-way queues.
//!
//! An `owq` is a single-producer/single-consumer ring over a fixed slot array.
//! Empty and full are told apart by one reserved bit in each index rather than
//! by a shared counter, so neither side ever writes a location the other side
//! writes.
//!
//! - [`sync::spsc`] - Safe `(Producer, Consumer)` handles
//! - [`spsc`] - The raw ring algorithm and index encoding
//! - [`stress`] - Two-thread correctness and throughput harness

pub mod error;
pub mod placement;
pub mod spsc;
pub mod stress;
pub mod sync;
mod trace;

#[doc(inline)]
pub use error::{ConstructionError, QueueEmpty, QueueFull};

#[doc(inline)]
pub use spsc::ring::QueueState;

pub use trace::init_tracing;
