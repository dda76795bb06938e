//! CPU placement for the producer and consumer threads of a stress run.
//!
//! The two threads hammer the same pair of cache lines, so where they run
//! decides what is being measured: two physical cores exercise the cross-core
//! visibility of the index stores, SMT siblings share L1 and mostly measure
//! the algorithm.
//!
//! Uses `num_cpus` for physical/logical core counts and `core_affinity` for
//! pinning. On most systems, core IDs 0..N map to separate physical cores
//! before SMT siblings are enumerated.

use core_affinity::CoreId;
use serde::{Deserialize, Serialize};

/// Where the producer and consumer threads should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadPlacement {
    /// Core for the producer (None = unpinned).
    pub producer_core: Option<usize>,
    /// Core for the consumer (None = unpinned).
    pub consumer_core: Option<usize>,
}

impl ThreadPlacement {
    #[must_use]
    pub const fn unpinned() -> Self {
        Self {
            producer_core: None,
            consumer_core: None,
        }
    }

    /// Picks two distinct physical cores if the machine has them.
    #[must_use]
    pub fn detect() -> Self {
        let physical = num_cpus::get_physical();
        let available: Vec<usize> = core_affinity::get_core_ids()
            .map(|ids| ids.into_iter().map(|id| id.id).collect())
            .unwrap_or_default();

        Self::select(physical, &available)
    }

    /// Placement for a machine with `physical` cores and the given pinnable IDs.
    #[must_use]
    pub fn select(physical: usize, available: &[usize]) -> Self {
        match available {
            [first, second, ..] if physical >= 2 => Self {
                producer_core: Some(*first),
                consumer_core: Some(*second),
            },
            _ => Self::unpinned(),
        }
    }
}

/// User-facing CPU pinning configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CpuConfig {
    /// Detect topology and pin to distinct physical cores when possible.
    Auto,
    /// Pin to explicit cores.
    Manual {
        producer_core: Option<usize>,
        consumer_core: Option<usize>,
    },
    /// Let the OS schedule both threads.
    #[default]
    Disabled,
}

impl CpuConfig {
    /// Resolves the config to a concrete thread placement.
    #[must_use]
    pub fn resolve(&self) -> ThreadPlacement {
        match *self {
            Self::Auto => ThreadPlacement::detect(),
            Self::Manual {
                producer_core,
                consumer_core,
            } => ThreadPlacement {
                producer_core,
                consumer_core,
            },
            Self::Disabled => ThreadPlacement::unpinned(),
        }
    }
}

/// Pins the current thread to `core_id`.
///
/// Returns `true` if pinning succeeded. Pinning may fail if the core ID is
/// invalid or the OS denies the request.
pub fn pin_to_core(core_id: usize) -> bool {
    core_affinity::set_for_current(CoreId { id: core_id })
}
