//! Component/buffer graph and pipeline lifecycle.
//!
//! All components, buffers, and pipelines of an engine live in one [`Graph`],
//! stored in slot arenas keyed by their descriptor IDs. Edges are expressed as
//! handles, never as references:
//!
//! - a component lists its input buffers (`sources`) and output buffers
//!   (`sinks`) in insertion order;
//! - a buffer names its producing (`source`) and consuming (`sink`) component;
//! - a completed component names the pipeline that owns it.
//!
//! A pipeline does not hold its components directly. It owns the connected
//! subgraph reachable from its source whose components declare the same
//! pipeline ID, and stamps them during `complete`.
//!
//! # Walks
//!
//! Every lifecycle operation is a visitor driven by
//! [`Graph::for_each_comp`]: one level of fan-out per call, depth by visitor
//! recursion, branches halted by `Flow::PathStop` or by a pipeline boundary.

pub(crate) mod arena;
mod copy;
pub mod pipeline;
mod walk;

pub use pipeline::{PipelineDescriptor, PipelineInfo};

use crate::buffer::{Buffer, BufferId};
use crate::component::{Component, ComponentId};
use crate::engine::Platform;
use crate::error::{PipelineError, Result};
use crate::stream::Direction;

use arena::Arena;
use pipeline::Pipeline;

/// Unique identifier of a pipeline, assigned by the descriptor stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipelineId(pub u32);

impl PipelineId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Every object of one engine, plus the platform collaborators the lifecycle
/// operations call into.
pub(crate) struct Graph {
    pub comps: Arena<Component>,
    pub buffers: Arena<Buffer>,
    pub pipelines: Arena<Pipeline>,
    pub platform: Platform,
}

impl Graph {
    pub fn new(platform: Platform) -> Self {
        Self {
            comps: Arena::new(),
            buffers: Arena::new(),
            pipelines: Arena::new(),
            platform,
        }
    }

    pub fn comp(&self, id: ComponentId) -> Result<&Component> {
        self.comps
            .get(id.0)
            .ok_or(PipelineError::ComponentNotFound(id))
    }

    pub fn comp_mut(&mut self, id: ComponentId) -> Result<&mut Component> {
        self.comps
            .get_mut(id.0)
            .ok_or(PipelineError::ComponentNotFound(id))
    }

    pub fn buffer(&self, id: BufferId) -> Result<&Buffer> {
        self.buffers.get(id.0).ok_or(PipelineError::BufferNotFound(id))
    }

    pub fn buffer_mut(&mut self, id: BufferId) -> Result<&mut Buffer> {
        self.buffers
            .get_mut(id.0)
            .ok_or(PipelineError::BufferNotFound(id))
    }

    pub fn pipeline(&self, id: PipelineId) -> Result<&Pipeline> {
        self.pipelines
            .get(id.0)
            .ok_or(PipelineError::PipelineNotFound(id))
    }

    pub fn pipeline_mut(&mut self, id: PipelineId) -> Result<&mut Pipeline> {
        self.pipelines
            .get_mut(id.0)
            .ok_or(PipelineError::PipelineNotFound(id))
    }

    pub fn add_component(&mut self, comp: Component) -> Result<()> {
        let id = comp.dev.id();
        self.comps.insert(id.0, comp)
    }

    /// Unlinks every buffer of `id` and releases it.
    ///
    /// Fails with `ComponentBusy` while a pipeline still owns the component.
    pub fn free_component(&mut self, id: ComponentId) -> Result<Component> {
        let comp = self.comp(id)?;
        if comp.dev.pipeline().is_some() {
            tracing::error!(comp = %id, "free of component still owned by a pipeline");
            return Err(PipelineError::ComponentBusy(id));
        }
        let attached: Vec<BufferId> = comp.sources.iter().chain(&comp.sinks).copied().collect();
        for buf in attached {
            self.unlink_buffer(buf);
        }
        self.comps
            .remove(id.0)
            .ok_or(PipelineError::ComponentNotFound(id))
    }

    pub fn add_buffer(&mut self, buffer: Buffer) -> Result<()> {
        let id = buffer.id();
        self.buffers.insert(id.0, buffer)
    }

    /// Unlinks `id` from both endpoints and releases it.
    pub fn free_buffer(&mut self, id: BufferId) -> Result<Buffer> {
        self.buffer(id)?;
        self.unlink_buffer(id);
        self.buffers
            .remove(id.0)
            .ok_or(PipelineError::BufferNotFound(id))
    }

    /// Attaches `buffer` to `comp` on the `dir` side of the component.
    ///
    /// `Downstream` makes the buffer an output of `comp` (the component becomes
    /// the buffer's source); `Upstream` makes it an input.
    pub fn connect(&mut self, comp: ComponentId, buffer: BufferId, dir: Direction) -> Result<()> {
        self.comp(comp)?;
        let buf = self.buffer_mut(buffer)?;
        if buf.endpoint(dir.reverse()).is_some() {
            tracing::error!(comp = %comp, buffer = %buffer, ?dir, "buffer side already connected");
            return Err(PipelineError::BufferInUse(buffer));
        }
        buf.set_endpoint(dir.reverse(), Some(comp));
        self.comp_mut(comp)?.buffers_mut(dir).push(buffer);
        tracing::debug!(comp = %comp, buffer = %buffer, ?dir, "connected");
        Ok(())
    }

    /// Removes `id` from the lists of both endpoint components.
    pub fn unlink_buffer(&mut self, id: BufferId) {
        let Some(buf) = self.buffers.get_mut(id.0) else {
            return;
        };
        let producer = buf.source.take();
        let consumer = buf.sink.take();
        if let Some(comp) = producer.and_then(|c| self.comps.get_mut(c.0)) {
            comp.sinks.retain(|b| *b != id);
        }
        if let Some(comp) = consumer.and_then(|c| self.comps.get_mut(c.0)) {
            comp.sources.retain(|b| *b != id);
        }
    }
}
