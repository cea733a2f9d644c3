//! Cache-coherency hooks.
//!
//! Components and buffers may be written on one core and read on another.
//! The engine brackets every cross-core handoff with cache operations on the
//! affected memory regions; platforms with coherent memory install
//! [`NoCache`].

use parking_lot::Mutex;

use crate::buffer::BufferId;
use crate::component::ComponentId;
use crate::graph::PipelineId;

/// Cache maintenance operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheOp {
    /// Drop cached lines so the next access reads memory.
    Invalidate,
    /// Write dirty lines back to memory, then drop them.
    WritebackInvalidate,
}

/// Memory region a cache operation applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheRegion {
    /// Pipeline object.
    Pipeline(PipelineId),
    /// Component object, including driver-private state.
    Component(ComponentId),
    /// Buffer object and its sample storage.
    Buffer(BufferId),
}

/// Platform cache controller.
pub trait CacheController: Send + Sync {
    /// Invalidates `region`.
    fn invalidate(&self, region: CacheRegion);

    /// Writes back and invalidates `region`.
    fn writeback_invalidate(&self, region: CacheRegion);

    /// Applies `op` to `region`.
    fn apply(&self, op: CacheOp, region: CacheRegion) {
        match op {
            CacheOp::Invalidate => self.invalidate(region),
            CacheOp::WritebackInvalidate => self.writeback_invalidate(region),
        }
    }
}

/// Controller for coherent platforms. Every operation is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

impl CacheController for NoCache {
    fn invalidate(&self, _region: CacheRegion) {}

    fn writeback_invalidate(&self, _region: CacheRegion) {}
}

/// Controller that records every operation in order.
#[derive(Debug, Default)]
pub struct RecordingCache {
    log: Mutex<Vec<(CacheOp, CacheRegion)>>,
}

impl RecordingCache {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations recorded so far.
    pub fn entries(&self) -> Vec<(CacheOp, CacheRegion)> {
        self.log.lock().clone()
    }

    /// Discards the log.
    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl CacheController for RecordingCache {
    fn invalidate(&self, region: CacheRegion) {
        self.log.lock().push((CacheOp::Invalidate, region));
    }

    fn writeback_invalidate(&self, region: CacheRegion) {
        self.log.lock().push((CacheOp::WritebackInvalidate, region));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_cache_keeps_order() {
        let cache = RecordingCache::new();
        cache.apply(CacheOp::WritebackInvalidate, CacheRegion::Pipeline(PipelineId(1)));
        cache.apply(CacheOp::Invalidate, CacheRegion::Buffer(BufferId(3)));
        assert_eq!(
            cache.entries(),
            vec![
                (CacheOp::WritebackInvalidate, CacheRegion::Pipeline(PipelineId(1))),
                (CacheOp::Invalidate, CacheRegion::Buffer(BufferId(3))),
            ]
        );
        cache.clear();
        assert!(cache.entries().is_empty());
    }
}
