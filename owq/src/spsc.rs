//! Core SPSC (Single-Producer Single-Consumer) queue primitives.
//!
//! - [`position`] - Packed index + disambiguation flag arithmetic
//! - [`ring`] - The lock-free ring buffer algorithm over those positions
//!
//! The safe, handle-based API lives in [`crate::sync::spsc`].

pub mod position;
pub mod ring;
