//! Building a topology into an engine and driving its streams.

use cadence_core::{
    BufferDescriptor, BufferId, ComponentId, ComponentState, Direction, Engine, PipelineError,
    PipelineId, StreamDirection, StreamParams, TriggerCmd,
};

use crate::error::ConfigError;
use crate::topology::Topology;
use crate::validation::validate_topology;

/// A host stream of a built topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltStream {
    /// Pipeline the stream runs on.
    pub pipeline: PipelineId,
    /// Host endpoint the stream enters at.
    pub host: ComponentId,
    /// Parameters applied when the stream starts.
    pub params: StreamParams,
}

/// IDs of everything a topology created in an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltTopology {
    /// Topology name.
    pub name: String,
    /// Pipelines in completion order.
    pub pipelines: Vec<PipelineId>,
    /// Components in creation order.
    pub components: Vec<ComponentId>,
    /// Buffers in creation order.
    pub buffers: Vec<BufferId>,
    /// Host streams in start order.
    pub streams: Vec<BuiltStream>,
}

impl Topology {
    /// Validates the topology against the engine's registry, then creates
    /// and connects every component and buffer and completes every pipeline.
    pub fn build(&self, engine: &Engine) -> Result<BuiltTopology, ConfigError> {
        validate_topology(self, engine.registry())?;
        tracing::info!(topology = %self.name, pipelines = self.pipelines.len(), "building topology");

        let mut built = BuiltTopology {
            name: self.name.clone(),
            pipelines: Vec::with_capacity(self.pipelines.len()),
            components: Vec::with_capacity(self.components.len()),
            buffers: Vec::with_capacity(self.buffers.len()),
            streams: Vec::with_capacity(self.streams.len()),
        };

        for c in &self.components {
            let core = self.pipeline(c.pipeline).map_or(0, |p| p.core);
            built.components.push(engine.comp_new(&c.descriptor(core))?);
        }

        for b in &self.buffers {
            let id = engine.buffer_new(&BufferDescriptor::new(b.id, b.pipeline, b.size))?;
            engine.connect(ComponentId(b.from), id, Direction::Downstream)?;
            engine.connect(ComponentId(b.to), id, Direction::Upstream)?;
            built.buffers.push(id);
        }

        for p in &self.pipelines {
            built.pipelines.push(engine.pipeline_new(p.descriptor())?);
        }
        for p in &self.pipelines {
            engine.complete(PipelineId(p.id), ComponentId(p.source), ComponentId(p.sink))?;
        }

        for s in &self.streams {
            let direction = self
                .component(s.host)
                .map_or(StreamDirection::Playback, |c| c.direction.into());
            built.streams.push(BuiltStream {
                pipeline: PipelineId(s.pipeline),
                host: ComponentId(s.host),
                params: s.params(direction),
            });
        }

        tracing::debug!(
            topology = %self.name,
            components = built.components.len(),
            buffers = built.buffers.len(),
            "topology built"
        );
        Ok(built)
    }
}

impl BuiltTopology {
    /// Applies params, prepares and starts every stream in order.
    pub fn start(&self, engine: &Engine) -> Result<(), PipelineError> {
        for s in &self.streams {
            engine.params(s.pipeline, s.host, s.params)?;
            engine.prepare(s.pipeline, s.host)?;
            engine.trigger(s.pipeline, s.host, TriggerCmd::Start)?;
            tracing::info!(pipeline = %s.pipeline, host = %s.host, rate = s.params.rate, "stream started");
        }
        Ok(())
    }

    /// Stops every running stream, last started first, then resets them.
    pub fn stop(&self, engine: &Engine) -> Result<(), PipelineError> {
        for s in self.streams.iter().rev() {
            let status = engine.pipeline_info(s.pipeline)?.status;
            if matches!(status, ComponentState::Active | ComponentState::Paused) {
                engine.trigger(s.pipeline, s.host, TriggerCmd::Stop)?;
            }
        }
        for s in self.streams.iter().rev() {
            engine.reset(s.pipeline, s.host)?;
            tracing::info!(pipeline = %s.pipeline, host = %s.host, "stream stopped");
        }
        Ok(())
    }

    /// Frees every pipeline, component and buffer the topology created.
    ///
    /// The streams must be stopped first.
    pub fn teardown(&self, engine: &Engine) -> Result<(), PipelineError> {
        for p in self.pipelines.iter().rev() {
            engine.free(*p)?;
        }
        for c in &self.components {
            engine.comp_free(*c)?;
        }
        for b in &self.buffers {
            engine.buffer_free(*b)?;
        }
        tracing::debug!(topology = %self.name, "topology torn down");
        Ok(())
    }
}
