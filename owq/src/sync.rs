//! Synchronization primitives for in-process communication.
//!
//! This module provides thread-safe queues for communication between
//! threads within the same process.

pub mod spsc;
