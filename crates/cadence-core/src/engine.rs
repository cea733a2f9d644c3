//! The engine: the host-facing entry point for every graph operation.
//!
//! An [`Engine`] owns one [`Graph`] behind a single lock. Each lifecycle
//! method takes the lock for the duration of its walk, so walks never
//! interleave. A trigger for a pipeline owned by another core releases the
//! lock before it blocks on the cross-core channel, which lets the remote
//! core's worker take it.
//!
//! ```rust,ignore
//! let sched = Arc::new(ManualScheduler::new());
//! let engine = Engine::new(EngineConfig::default(), registry, Platform::simulated(sched.clone()));
//! engine.comp_new(&ComponentDescriptor::new(1, "host", 1))?;
//! // ... buffers, pipeline, connect, complete ...
//! engine.prepare(PipelineId(1), ComponentId(1))?;
//! engine.trigger(PipelineId(1), ComponentId(1), TriggerCmd::Start)?;
//! sched.advance(1000, |task| engine.run_task(task));
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::{Buffer, BufferDescriptor, BufferId, BufferInfo};
use crate::cache::{CacheController, CacheOp, NoCache};
use crate::component::{
    Component, ComponentDescriptor, ComponentDev, ComponentId, ComponentState, Flow, TriggerCmd,
};
use crate::cpu::{CoreId, CoreSet, current_core};
use crate::error::{PipelineError, Result};
use crate::graph::{Graph, PipelineDescriptor, PipelineId, PipelineInfo};
use crate::idc::{Idc, IdcMessage};
use crate::notify::{HostNotifier, NullNotifier};
use crate::registry::DriverRegistry;
use crate::schedule::{Clock, ManualScheduler, Scheduler, TaskId};
use crate::stream::{Direction, StreamParams, StreamPosition};

/// Platform services the engine calls into.
#[derive(Clone)]
pub struct Platform {
    /// Runs pipeline tasks.
    pub scheduler: Arc<dyn Scheduler>,
    /// Cache maintenance around cross-core handoffs.
    pub cache: Arc<dyn CacheController>,
    /// Host notification channel.
    pub notifier: Arc<dyn HostNotifier>,
    /// Timestamp source.
    pub clock: Arc<dyn Clock>,
}

impl Platform {
    /// Bundles a scheduler and clock with a coherent cache and no notifier.
    pub fn new(scheduler: Arc<dyn Scheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            scheduler,
            cache: Arc::new(NoCache),
            notifier: Arc::new(NullNotifier),
            clock,
        }
    }

    /// Platform driven entirely by a [`ManualScheduler`], which also serves
    /// as the clock.
    pub fn simulated(scheduler: Arc<ManualScheduler>) -> Self {
        Self::new(scheduler.clone(), scheduler)
    }

    /// Replaces the cache controller.
    pub fn with_cache(mut self, cache: Arc<dyn CacheController>) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the host notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn HostNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

/// Static engine configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of cores pipelines may be placed on. Only the primary core is
    /// enabled until a [`CoreWorker`](crate::CoreWorker) is started.
    pub cores: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { cores: 1 }
    }
}

/// Pipeline execution engine.
pub struct Engine {
    graph: Mutex<Graph>,
    registry: Arc<DriverRegistry>,
    cores: CoreSet,
    idc: Idc,
    config: EngineConfig,
}

impl Engine {
    /// Creates an empty engine.
    pub fn new(config: EngineConfig, registry: Arc<DriverRegistry>, platform: Platform) -> Self {
        tracing::debug!(cores = config.cores, "engine created");
        Self {
            graph: Mutex::new(Graph::new(platform)),
            registry,
            cores: CoreSet::new(config.cores),
            idc: Idc::new(),
            config,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Enabled-core mask.
    pub fn cores(&self) -> &CoreSet {
        &self.cores
    }

    /// Driver registry used by [`comp_new`](Self::comp_new).
    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    /// Platform services.
    pub fn platform(&self) -> Platform {
        self.graph.lock().platform.clone()
    }

    pub(crate) fn idc(&self) -> &Idc {
        &self.idc
    }

    fn check_core(&self, core: CoreId) -> Result<()> {
        if core.0 >= self.config.cores {
            tracing::error!(%core, cores = self.config.cores, "core out of range");
            return Err(PipelineError::InvalidCore(core));
        }
        Ok(())
    }

    // --- construction ---

    /// Creates a component through its registered driver. The new component
    /// is `Ready` and not yet owned by any pipeline.
    pub fn comp_new(&self, desc: &ComponentDescriptor) -> Result<ComponentId> {
        self.check_core(desc.core)?;
        let (driver, role) = self.registry.create(desc)?;
        let mut dev = ComponentDev::new(desc, role);
        dev.set_state(TriggerCmd::Reset)?;

        self.graph.lock().add_component(Component {
            dev,
            driver,
            sources: Vec::new(),
            sinks: Vec::new(),
        })?;
        tracing::debug!(comp = %desc.id, kind = %desc.kind, pipeline = desc.pipeline_id.0, "component created");
        Ok(desc.id)
    }

    /// Releases a component that no pipeline owns.
    pub fn comp_free(&self, id: ComponentId) -> Result<()> {
        self.graph.lock().free_component(id)?;
        tracing::debug!(comp = %id, "component freed");
        Ok(())
    }

    /// Allocates a buffer.
    pub fn buffer_new(&self, desc: &BufferDescriptor) -> Result<BufferId> {
        let buffer = Buffer::new(desc).inspect_err(|e| {
            tracing::error!(buffer = %desc.id, size = desc.size, error = %e, "buffer allocation failed");
        })?;
        self.graph.lock().add_buffer(buffer)?;
        tracing::debug!(buffer = %desc.id, size = desc.size, "buffer created");
        Ok(desc.id)
    }

    /// Unlinks and releases a buffer.
    pub fn buffer_free(&self, id: BufferId) -> Result<()> {
        self.graph.lock().free_buffer(id)?;
        tracing::debug!(buffer = %id, "buffer freed");
        Ok(())
    }

    /// Creates a pipeline in `Init` and registers its task.
    pub fn pipeline_new(&self, desc: PipelineDescriptor) -> Result<PipelineId> {
        self.check_core(desc.core)?;
        self.graph.lock().pipeline_new(desc)?;
        Ok(desc.id)
    }

    /// Attaches `buffer` on the `dir` side of `comp`.
    pub fn connect(&self, comp: ComponentId, buffer: BufferId, dir: Direction) -> Result<()> {
        self.graph.lock().connect(comp, buffer, dir)
    }

    /// Claims the subgraph from `source` for the pipeline.
    pub fn complete(&self, pipeline: PipelineId, source: ComponentId, sink: ComponentId) -> Result<()> {
        self.graph.lock().pipeline_complete(pipeline, source, sink)
    }

    /// Releases a pipeline that is not running.
    pub fn free(&self, pipeline: PipelineId) -> Result<()> {
        self.graph.lock().pipeline_free(pipeline)
    }

    // --- lifecycle ---

    /// Propagates stream parameters from `host`.
    pub fn params(&self, pipeline: PipelineId, host: ComponentId, params: StreamParams) -> Result<()> {
        tracing::debug!(pipeline = %pipeline, comp = %host, rate = params.rate, channels = params.channels, "params");
        self.graph
            .lock()
            .pipeline_params(pipeline, host, params)
            .map(drop)
    }

    /// Prepares every component reached from `dev`.
    pub fn prepare(&self, pipeline: PipelineId, dev: ComponentId) -> Result<()> {
        self.graph.lock().pipeline_prepare(pipeline, dev).map(drop)
    }

    /// Applies a trigger command from `host`.
    ///
    /// Pipelines owned by another core are triggered through that core's
    /// worker: the pipeline is written back before a `Start` is sent and
    /// invalidated after a `Stop` returns.
    pub fn trigger(&self, pipeline: PipelineId, host: ComponentId, cmd: TriggerCmd) -> Result<()> {
        let mut graph = self.graph.lock();
        if graph.xrun_handle_trigger(pipeline, cmd)? == Flow::PathStop {
            return Ok(());
        }

        let core = graph.pipeline(pipeline)?.desc.core;
        if core == current_core() {
            return graph.trigger_local(pipeline, host, cmd).map(drop);
        }

        if !self.cores.is_enabled(core) {
            tracing::error!(pipeline = %pipeline, %core, "trigger for disabled core");
            return Err(PipelineError::InvalidCore(core));
        }
        if cmd == TriggerCmd::Start {
            graph.pipeline_cache(pipeline, host, CacheOp::WritebackInvalidate)?;
        }
        drop(graph);

        tracing::debug!(pipeline = %pipeline, %core, ?cmd, "trigger sent to remote core");
        self.idc
            .send(core, IdcMessage::Trigger { pipeline, host, cmd })?;

        if cmd == TriggerCmd::Stop {
            self.graph
                .lock()
                .pipeline_cache(pipeline, host, CacheOp::Invalidate)?;
        }
        Ok(())
    }

    /// Returns every component reached from `host` to `Ready`.
    pub fn reset(&self, pipeline: PipelineId, host: ComponentId) -> Result<()> {
        self.graph.lock().pipeline_reset(pipeline, host).map(drop)
    }

    /// Applies a cache operation to the whole pipeline, starting at its host
    /// endpoint.
    pub fn cache(&self, pipeline: PipelineId, op: CacheOp) -> Result<()> {
        let mut graph = self.graph.lock();
        let host = graph.host_endpoint(pipeline)?;
        graph.pipeline_cache(pipeline, host, op)
    }

    /// Raises an XRUN on behalf of component `comp`.
    pub fn report_xrun(&self, comp: ComponentId, bytes: u32) {
        self.graph.lock().pipeline_xrun(comp, bytes);
    }

    /// Host and DAI positions of a running pipeline.
    pub fn timestamp(&self, pipeline: PipelineId, host: ComponentId) -> Result<StreamPosition> {
        self.graph.lock().pipeline_timestamp(pipeline, host)
    }

    /// Queues a copy `start_us` from now if the pipeline is running.
    pub fn schedule_copy(&self, pipeline: PipelineId, start_us: u64) {
        self.graph.lock().schedule_copy(pipeline, start_us);
    }

    /// Scheduler callback for a pipeline task.
    pub fn run_task(&self, task: TaskId) -> u64 {
        self.graph.lock().run_task(task)
    }

    /// Executes a message received from another core.
    pub(crate) fn handle_idc(&self, msg: IdcMessage) -> Result<()> {
        match msg {
            IdcMessage::Trigger { pipeline, host, cmd } => self.trigger(pipeline, host, cmd),
        }
    }

    // --- queries ---

    /// Lifecycle state of a component.
    pub fn component_state(&self, id: ComponentId) -> Result<ComponentState> {
        Ok(self.graph.lock().comp(id)?.dev.state())
    }

    /// Pipeline that owns a component, if completed.
    pub fn component_pipeline(&self, id: ComponentId) -> Result<Option<PipelineId>> {
        Ok(self.graph.lock().comp(id)?.dev.pipeline())
    }

    /// Stream parameters a component accepted.
    pub fn component_params(&self, id: ComponentId) -> Result<StreamParams> {
        Ok(self.graph.lock().comp(id)?.dev.params)
    }

    /// Buffer lists of a component: (sources, sinks).
    pub fn component_buffers(&self, id: ComponentId) -> Result<(Vec<BufferId>, Vec<BufferId>)> {
        let graph = self.graph.lock();
        let comp = graph.comp(id)?;
        Ok((comp.sources.clone(), comp.sinks.clone()))
    }

    /// Snapshot of a buffer.
    pub fn buffer_info(&self, id: BufferId) -> Result<BufferInfo> {
        Ok(self.graph.lock().buffer(id)?.info())
    }

    /// Snapshot of a pipeline.
    pub fn pipeline_info(&self, id: PipelineId) -> Result<PipelineInfo> {
        Ok(self.graph.lock().pipeline(id)?.info())
    }

    /// Snapshots of every pipeline, by ID.
    pub fn pipelines(&self) -> Vec<PipelineInfo> {
        self.graph.lock().pipelines.iter().map(|p| p.info()).collect()
    }
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("cores", &self.cores)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::CopyContext;
    use crate::component::EndpointRole;
    use crate::registry::DriverInfo;
    use crate::stream::StreamDirection;

    struct Null;

    impl crate::component::ComponentDriver for Null {
        fn copy(&mut self, _dev: &mut ComponentDev, _io: &mut CopyContext<'_>) -> Result<Flow> {
            Ok(Flow::Continue)
        }
    }

    fn null(_desc: &ComponentDescriptor) -> Result<Box<dyn crate::component::ComponentDriver>> {
        Ok(Box::new(Null))
    }

    fn engine(cores: u32) -> Engine {
        let registry = DriverRegistry::new();
        for (kind, role) in [("host", EndpointRole::Host), ("dai", EndpointRole::Dai)] {
            registry.register(
                DriverInfo {
                    kind,
                    name: kind,
                    description: "null",
                    role,
                },
                null,
            );
        }
        let sched = Arc::new(ManualScheduler::new());
        Engine::new(EngineConfig { cores }, Arc::new(registry), Platform::simulated(sched))
    }

    #[test]
    fn new_component_is_ready_and_unowned() {
        let e = engine(1);
        let id = e.comp_new(&ComponentDescriptor::new(1, "host", 1)).unwrap();
        assert_eq!(e.component_state(id), Ok(ComponentState::Ready));
        assert_eq!(e.component_pipeline(id), Ok(None));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let e = engine(1);
        let err = e.comp_new(&ComponentDescriptor::new(1, "eq", 1)).unwrap_err();
        assert_eq!(err, PipelineError::UnknownComponentType("eq".into()));
    }

    #[test]
    fn objects_beyond_configured_cores_are_rejected() {
        let e = engine(2);
        assert_eq!(
            e.pipeline_new(PipelineDescriptor::new(1, 1).with_core(2)),
            Err(PipelineError::InvalidCore(CoreId(2)))
        );
        assert!(e.pipeline_new(PipelineDescriptor::new(1, 1).with_core(1)).is_ok());
    }

    #[test]
    fn remote_trigger_without_worker_fails() {
        let e = engine(2);
        let desc = ComponentDescriptor::new(1, "host", 1).with_direction(StreamDirection::Playback);
        e.comp_new(&desc).unwrap();
        e.comp_new(&ComponentDescriptor::new(2, "dai", 1)).unwrap();
        e.buffer_new(&BufferDescriptor::new(10, 1, 64)).unwrap();
        e.connect(ComponentId(1), BufferId(10), Direction::Downstream).unwrap();
        e.connect(ComponentId(2), BufferId(10), Direction::Upstream).unwrap();
        e.pipeline_new(PipelineDescriptor::new(1, 2).with_core(1)).unwrap();
        e.complete(PipelineId(1), ComponentId(1), ComponentId(2)).unwrap();
        e.prepare(PipelineId(1), ComponentId(1)).unwrap();

        assert_eq!(
            e.trigger(PipelineId(1), ComponentId(1), TriggerCmd::Start),
            Err(PipelineError::InvalidCore(CoreId(1)))
        );
        assert_eq!(e.component_state(ComponentId(1)), Ok(ComponentState::Prepare));
    }

    #[test]
    fn buffer_info_reflects_links() {
        let e = engine(1);
        e.comp_new(&ComponentDescriptor::new(1, "host", 1)).unwrap();
        e.buffer_new(&BufferDescriptor::new(10, 1, 64)).unwrap();
        e.connect(ComponentId(1), BufferId(10), Direction::Downstream).unwrap();
        let info = e.buffer_info(BufferId(10)).unwrap();
        assert_eq!(info.source, Some(ComponentId(1)));
        assert_eq!(info.sink, None);
        assert_eq!(info.size, 64);
        e.buffer_free(BufferId(10)).unwrap();
        assert_eq!(e.component_buffers(ComponentId(1)), Ok((vec![], vec![])));
    }
}
