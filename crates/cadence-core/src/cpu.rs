//! DSP core identity and the enabled-core set.
//!
//! Each simulated core is an OS thread. The thread a lifecycle call runs on
//! decides whether a trigger executes locally or is dispatched to the
//! pipeline's owning core, so the executing core is tracked per thread.

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identifier of a DSP core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoreId(pub u32);

impl CoreId {
    /// The primary core. Always enabled.
    pub const PRIMARY: CoreId = CoreId(0);

    /// Returns the raw core index.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for CoreId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum number of cores a [`CoreSet`] can track.
pub const MAX_CORES: u32 = 32;

thread_local! {
    static CURRENT_CORE: Cell<CoreId> = const { Cell::new(CoreId::PRIMARY) };
}

/// Returns the core the calling thread executes on.
pub fn current_core() -> CoreId {
    CURRENT_CORE.with(Cell::get)
}

/// Binds the calling thread to `core`.
///
/// Core workers call this once at startup. Threads that never call it run as
/// the primary core.
pub fn set_current_core(core: CoreId) {
    CURRENT_CORE.with(|c| c.set(core));
}

/// Bit set of enabled cores.
#[derive(Debug)]
pub struct CoreSet {
    mask: AtomicU32,
    count: u32,
}

impl CoreSet {
    /// Creates a set for `count` cores with only the primary core enabled.
    pub fn new(count: u32) -> Self {
        Self {
            mask: AtomicU32::new(1),
            count: count.clamp(1, MAX_CORES),
        }
    }

    /// Number of cores the platform has.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Marks `core` enabled. Returns `false` if the core does not exist.
    pub fn enable(&self, core: CoreId) -> bool {
        if core.0 >= self.count {
            return false;
        }
        self.mask.fetch_or(1 << core.0, Ordering::AcqRel);
        true
    }

    /// Marks `core` disabled. The primary core cannot be disabled.
    pub fn disable(&self, core: CoreId) {
        if core != CoreId::PRIMARY && core.0 < self.count {
            self.mask.fetch_and(!(1 << core.0), Ordering::AcqRel);
        }
    }

    /// Returns true if `core` exists and is enabled.
    pub fn is_enabled(&self, core: CoreId) -> bool {
        core.0 < self.count && self.mask.load(Ordering::Acquire) & (1 << core.0) != 0
    }
}
