//! Pipelines and their lifecycle operations.
//!
//! Commands enter at a host-facing component and travel away from the host:
//! downstream for playback, upstream for capture. Each operation below is a
//! visitor function plus a small context struct handed to
//! [`Graph::for_each_comp`].
//!
//! Crossing into a neighbouring pipeline is decided per operation:
//!
//! | Operation | Enters a neighbour pipeline when |
//! |---|---|
//! | complete, free | never |
//! | params, prepare, reset | its sink role suits the stream direction |
//! | trigger, copy | it shares the scheduling component |
//! | cache | never (neighbour components are cached but not walked) |

use std::sync::Arc;

use crate::buffer::Buffer;
use crate::cache::{CacheController, CacheOp, CacheRegion};
use crate::component::{Component, ComponentId, ComponentState, EndpointRole, Flow, TriggerCmd};
use crate::cpu::CoreId;
use crate::error::{PipelineError, Result};
use crate::schedule::{ScheduleFlags, TaskConfig, TaskId, TaskKind};
use crate::stream::{Direction, StreamDirection, StreamParams, StreamPosition};

use super::{Graph, PipelineId};

/// Creation request for a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineDescriptor {
    /// Pipeline ID.
    pub id: PipelineId,
    /// Core that owns the pipeline and runs its task.
    pub core: CoreId,
    /// Scheduling period in microseconds.
    pub period_us: u64,
    /// Task priority.
    pub priority: u32,
    /// Frames moved per scheduling period.
    pub frames_per_sched: u32,
    /// Fixed-period (timer) rather than deadline scheduling.
    pub timer_driven: bool,
    /// Component whose trigger (de)schedules the pipeline task.
    pub sched_comp: ComponentId,
}

impl PipelineDescriptor {
    /// Creates a timer-driven 1 ms / 48 frame pipeline on the primary core.
    pub fn new(id: u32, sched_comp: u32) -> Self {
        Self {
            id: PipelineId(id),
            core: CoreId::PRIMARY,
            period_us: 1000,
            priority: 0,
            frames_per_sched: 48,
            timer_driven: true,
            sched_comp: ComponentId(sched_comp),
        }
    }

    /// Sets the owning core.
    pub fn with_core(mut self, core: u32) -> Self {
        self.core = CoreId(core);
        self
    }

    /// Sets the period and the frames moved per period.
    pub fn with_period(mut self, period_us: u64, frames_per_sched: u32) -> Self {
        self.period_us = period_us;
        self.frames_per_sched = frames_per_sched;
        self
    }

    /// Sets the task priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Switches to deadline-driven scheduling.
    pub fn deadline_driven(mut self) -> Self {
        self.timer_driven = false;
        self
    }
}

/// Read-only snapshot of a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineInfo {
    /// Pipeline ID.
    pub id: PipelineId,
    /// Owning core.
    pub core: CoreId,
    /// Lifecycle status.
    pub status: ComponentState,
    /// Size of the pending XRUN; 0 when healthy.
    pub xrun_bytes: u32,
    /// Buffers are being pre-filled before the stream is audible.
    pub preload: bool,
    /// Subgraph entry, once completed.
    pub source: Option<ComponentId>,
    /// Subgraph exit, once completed.
    pub sink: Option<ComponentId>,
    /// Scheduling component.
    pub sched_comp: ComponentId,
    /// Scheduling period in microseconds.
    pub period_us: u64,
    /// Timer rather than deadline driven.
    pub timer_driven: bool,
    /// XRUNs raised since creation.
    pub xrun_count: u64,
    /// Copy cycles completed since creation.
    pub copy_count: u64,
}

pub(crate) struct Pipeline {
    pub desc: PipelineDescriptor,
    pub status: ComponentState,
    pub xrun_bytes: u32,
    pub preload: bool,
    pub source: Option<ComponentId>,
    pub sink: Option<ComponentId>,
    pub xrun_count: u64,
    pub copy_count: u64,
}

impl Pipeline {
    fn new(desc: PipelineDescriptor) -> Self {
        Self {
            desc,
            status: ComponentState::Init,
            xrun_bytes: 0,
            preload: false,
            source: None,
            sink: None,
            xrun_count: 0,
            copy_count: 0,
        }
    }

    pub fn task(&self) -> TaskId {
        TaskId::from(self.desc.id)
    }

    pub fn info(&self) -> PipelineInfo {
        PipelineInfo {
            id: self.desc.id,
            core: self.desc.core,
            status: self.status,
            xrun_bytes: self.xrun_bytes,
            preload: self.preload,
            source: self.source,
            sink: self.sink,
            sched_comp: self.desc.sched_comp,
            period_us: self.desc.period_us,
            timer_driven: self.desc.timer_driven,
            xrun_count: self.xrun_count,
            copy_count: self.copy_count,
        }
    }
}

/// Pipeline status after `cmd` has been applied.
fn status_after(cmd: TriggerCmd) -> ComponentState {
    match cmd {
        TriggerCmd::Start | TriggerCmd::Release => ComponentState::Active,
        TriggerCmd::Pause | TriggerCmd::Xrun => ComponentState::Paused,
        TriggerCmd::Stop | TriggerCmd::Prepare => ComponentState::Prepare,
        TriggerCmd::Reset => ComponentState::Ready,
    }
}

struct CompleteCtx {
    pipeline: PipelineId,
    start: ComponentId,
    frames: u32,
}

fn complete_visit(g: &mut Graph, ctx: &mut CompleteCtx, current: ComponentId, dir: Direction) -> Result<Flow> {
    if !g.is_single_pipeline(current, ctx.start) {
        tracing::trace!(pipeline = %ctx.pipeline, comp = %current, "complete: component from another pipeline");
        return Ok(Flow::Continue);
    }

    let dev = &mut g.comp_mut(current)?.dev;
    dev.pipeline = Some(ctx.pipeline);
    dev.frames = ctx.frames;

    g.for_each_comp(current, dir, ctx, complete_visit, None)?;
    Ok(Flow::Continue)
}

struct FreeCtx {
    pipeline: PipelineId,
    start: ComponentId,
}

fn free_visit(g: &mut Graph, ctx: &mut FreeCtx, current: ComponentId, dir: Direction) -> Result<Flow> {
    if !g.is_single_pipeline(current, ctx.start) {
        tracing::trace!(pipeline = %ctx.pipeline, comp = %current, "free: component from another pipeline");
        return Ok(Flow::Continue);
    }

    let dev = &mut g.comp_mut(current)?.dev;
    if dev.pipeline == Some(ctx.pipeline) {
        dev.pipeline = None;
    }

    g.for_each_comp(current, dir, ctx, free_visit, None)?;

    // Drop this pipeline's buffers from both endpoint lists.
    let owned: Vec<_> = g
        .comp(current)?
        .buffers(dir)
        .iter()
        .copied()
        .filter(|b| g.buffers.get(b.0).is_some_and(|buf| buf.pipeline_id() == ctx.pipeline))
        .collect();
    for buf in owned {
        g.unlink_buffer(buf);
    }
    Ok(Flow::Continue)
}

struct ParamsCtx {
    start: ComponentId,
    params: StreamParams,
}

fn params_visit(g: &mut Graph, ctx: &mut ParamsCtx, current: ComponentId, dir: Direction) -> Result<Flow> {
    if !g.is_single_pipeline(current, ctx.start) && g.crossing_blocked(current, ctx.params.direction) {
        tracing::trace!(comp = %current, "params: not entering neighbour pipeline");
        return Ok(Flow::Continue);
    }

    let Component { dev, driver, .. } = g.comp_mut(current)?;
    if dev.is_active() {
        tracing::trace!(comp = %current, "params: component running, keeps its configuration");
        return Ok(Flow::Continue);
    }

    dev.params = ctx.params;
    if driver.params(dev)? == Flow::PathStop {
        return Ok(Flow::PathStop);
    }
    ctx.params = dev.params;

    g.for_each_comp(current, dir, ctx, params_visit, Some(apply_buffer_params))
}

fn apply_buffer_params(buffer: &mut Buffer, ctx: &ParamsCtx) {
    buffer.set_params(&ctx.params);
}

struct PrepareCtx {
    start: ComponentId,
    direction: StreamDirection,
}

fn prepare_visit(g: &mut Graph, ctx: &mut PrepareCtx, current: ComponentId, dir: Direction) -> Result<Flow> {
    if !g.is_single_pipeline(current, ctx.start) && g.crossing_blocked(current, ctx.direction) {
        tracing::trace!(comp = %current, "prepare: not entering neighbour pipeline");
        return Ok(Flow::Continue);
    }

    let Component { dev, driver, .. } = g.comp_mut(current)?;
    if driver.prepare(dev)? == Flow::PathStop {
        return Ok(Flow::PathStop);
    }

    g.for_each_comp(current, dir, ctx, prepare_visit, Some(reset_buffer))
}

fn reset_buffer(buffer: &mut Buffer, _ctx: &PrepareCtx) {
    buffer.reset_pos();
}

struct CacheCtx {
    start: ComponentId,
    op: CacheOp,
    cache: Arc<dyn CacheController>,
}

fn cache_visit(g: &mut Graph, ctx: &mut CacheCtx, current: ComponentId, dir: Direction) -> Result<Flow> {
    let comp = g.comp_mut(current)?;
    comp.driver.cache(&comp.dev, ctx.op);
    ctx.cache.apply(ctx.op, CacheRegion::Component(current));

    if !g.is_single_pipeline(current, ctx.start) {
        return Ok(Flow::Continue);
    }

    g.for_each_comp(current, dir, ctx, cache_visit, Some(cache_buffer))
}

fn cache_buffer(buffer: &mut Buffer, ctx: &CacheCtx) {
    ctx.cache.apply(ctx.op, CacheRegion::Buffer(buffer.id()));
}

struct TriggerCtx {
    pipeline: PipelineId,
    start: ComponentId,
    start_pipeline: Option<PipelineId>,
    cmd: TriggerCmd,
    handled: bool,
}

fn trigger_visit(g: &mut Graph, ctx: &mut TriggerCtx, current: ComponentId, dir: Direction) -> Result<Flow> {
    let owner = g.comp(current)?.dev.pipeline();
    let single = g.is_single_pipeline(current, ctx.start);
    let same_sched = g.is_same_sched(owner, ctx.start_pipeline);

    // Neighbour pipelines are triggered only when scheduled together.
    if !single && !same_sched {
        tracing::trace!(comp = %current, "trigger: component from another pipeline");
        return Ok(Flow::Continue);
    }

    let Component { dev, driver, .. } = g.comp_mut(current)?;
    if driver.trigger(dev, ctx.cmd)? == Flow::PathStop {
        return Ok(Flow::PathStop);
    }

    if let Some(owner) = owner
        && g.sched_comp_trigger(owner, current, ctx.cmd)
        && owner == ctx.pipeline
    {
        ctx.handled = true;
    }

    g.for_each_comp(current, dir, ctx, trigger_visit, None)
}

struct ResetCtx {
    start: ComponentId,
    direction: StreamDirection,
}

fn reset_visit(g: &mut Graph, ctx: &mut ResetCtx, current: ComponentId, dir: Direction) -> Result<Flow> {
    if !g.is_single_pipeline(current, ctx.start) && g.crossing_blocked(current, ctx.direction) {
        tracing::trace!(comp = %current, "reset: not entering neighbour pipeline");
        return Ok(Flow::Continue);
    }

    let Component { dev, driver, .. } = g.comp_mut(current)?;
    if driver.reset(dev)? == Flow::PathStop {
        return Ok(Flow::PathStop);
    }

    g.for_each_comp(current, dir, ctx, reset_visit, None)
}

struct TimestampCtx {
    start: ComponentId,
    posn: StreamPosition,
    found: bool,
}

fn timestamp_visit(g: &mut Graph, ctx: &mut TimestampCtx, current: ComponentId, dir: Direction) -> Result<Flow> {
    if ctx.found {
        return Ok(Flow::PathStop);
    }

    let comp = g.comp(current)?;
    if !comp.dev.is_active() {
        return Ok(Flow::Continue);
    }

    if current != ctx.start && comp.dev.role() == EndpointRole::Dai {
        comp.driver.position(&comp.dev, &mut ctx.posn);
        ctx.found = true;
        return Ok(Flow::PathStop);
    }

    g.for_each_comp(current, dir, ctx, timestamp_visit, None)
}

impl Graph {
    /// Registers a new pipeline in `Init` and its scheduler task.
    pub fn pipeline_new(&mut self, desc: PipelineDescriptor) -> Result<()> {
        self.pipelines.insert(desc.id.0, Pipeline::new(desc))?;
        let kind = if desc.timer_driven {
            TaskKind::Timer
        } else {
            TaskKind::Deadline
        };
        self.platform.scheduler.init(
            TaskId::from(desc.id),
            TaskConfig {
                kind,
                priority: desc.priority,
                core: desc.core,
            },
        );
        tracing::debug!(pipeline = %desc.id, core = %desc.core, period_us = desc.period_us, "pipeline created");
        Ok(())
    }

    /// The host-facing endpoint: source for playback, sink for capture.
    pub fn host_endpoint(&self, id: PipelineId) -> Result<ComponentId> {
        let p = self.pipeline(id)?;
        let (Some(source), Some(sink)) = (p.source, p.sink) else {
            return Err(PipelineError::NotCompleted(id));
        };
        Ok(match self.comp(source)?.dev.direction() {
            StreamDirection::Playback => source,
            StreamDirection::Capture => sink,
        })
    }

    /// Stamps the subgraph reachable downstream from `source`.
    pub fn pipeline_complete(&mut self, id: PipelineId, source: ComponentId, sink: ComponentId) -> Result<()> {
        let p = self.pipeline(id)?;
        if p.status != ComponentState::Init {
            tracing::error!(pipeline = %id, status = ?p.status, "pipeline already completed");
            return Err(PipelineError::AlreadyCompleted(id));
        }
        let frames = p.desc.frames_per_sched;
        self.comp(source)?;
        self.comp(sink)?;

        let mut ctx = CompleteCtx {
            pipeline: id,
            start: source,
            frames,
        };
        complete_visit(self, &mut ctx, source, Direction::Downstream)?;

        let p = self.pipeline_mut(id)?;
        p.source = Some(source);
        p.sink = Some(sink);
        p.status = ComponentState::Ready;
        tracing::debug!(pipeline = %id, source = %source, sink = %sink, "pipeline complete");
        Ok(())
    }

    /// Detaches and releases a pipeline that is not in use.
    pub fn pipeline_free(&mut self, id: PipelineId) -> Result<()> {
        let p = self.pipeline(id)?;
        let (source, task) = (p.source, p.task());
        if let Some(source) = source {
            let state = self.comp(source)?.dev.state();
            if state > ComponentState::Ready {
                tracing::error!(pipeline = %id, comp = %source, ?state, "pipeline in use");
                return Err(PipelineError::Busy(id));
            }
        }

        self.platform.scheduler.free(task);

        if let Some(source) = source {
            let mut ctx = FreeCtx { pipeline: id, start: source };
            free_visit(self, &mut ctx, source, Direction::Downstream)?;
        }

        self.pipelines.remove(id.0);
        tracing::debug!(pipeline = %id, "pipeline freed");
        Ok(())
    }

    /// Propagates stream parameters from `host` away from the host.
    pub fn pipeline_params(&mut self, id: PipelineId, host: ComponentId, params: StreamParams) -> Result<Flow> {
        self.pipeline(id)?;
        let dev = &self.comp(host)?.dev;
        if dev.is_active() {
            tracing::error!(pipeline = %id, comp = %host, "params on running host");
            return Err(PipelineError::InvalidPipelineState {
                id,
                status: ComponentState::Active,
            });
        }
        let dir = dev.direction().walk_direction();

        let mut ctx = ParamsCtx { start: host, params };
        params_visit(self, &mut ctx, host, dir).inspect_err(|e| {
            tracing::error!(pipeline = %id, comp = %host, error = %e, "params failed");
        })
    }

    /// Prepares every component and rewinds every buffer reached from `dev`.
    pub fn pipeline_prepare(&mut self, id: PipelineId, dev: ComponentId) -> Result<Flow> {
        self.pipeline(id)?;
        let direction = self.comp(dev)?.dev.direction();

        let mut ctx = PrepareCtx { start: dev, direction };
        let flow = prepare_visit(self, &mut ctx, dev, direction.walk_direction()).inspect_err(|e| {
            tracing::error!(pipeline = %id, comp = %dev, error = %e, "prepare failed");
        })?;

        // Mixer-style pipelines can share an already running sink.
        let sink_active = self
            .pipeline(id)?
            .sink
            .and_then(|s| self.comps.get(s.0))
            .is_some_and(|c| c.dev.is_active());
        let p = self.pipeline_mut(id)?;
        p.preload = direction == StreamDirection::Playback && !sink_active;
        p.status = ComponentState::Prepare;
        tracing::debug!(pipeline = %id, preload = p.preload, "pipeline prepared");
        Ok(flow)
    }

    /// Applies `op` to the pipeline object and to every component and buffer
    /// reached from `dev`.
    pub fn pipeline_cache(&mut self, id: PipelineId, dev: ComponentId, op: CacheOp) -> Result<()> {
        self.pipeline(id)?;
        let cache = Arc::clone(&self.platform.cache);
        if op == CacheOp::Invalidate {
            cache.invalidate(CacheRegion::Pipeline(id));
        }

        let dir = self.comp(dev)?.dev.direction().walk_direction();
        let mut ctx = CacheCtx {
            start: dev,
            op,
            cache: Arc::clone(&cache),
        };
        cache_visit(self, &mut ctx, dev, dir)?;

        if op == CacheOp::WritebackInvalidate {
            cache.writeback_invalidate(CacheRegion::Pipeline(id));
        }
        tracing::trace!(pipeline = %id, ?op, "pipeline cache op");
        Ok(())
    }

    /// Host-side handling of a trigger while the pipeline sits in XRUN.
    ///
    /// `Start` prepares the pipeline first and clears the XRUN; `Stop` is
    /// already done and returns `PathStop`. Anything else, or a pipeline not
    /// in XRUN, continues normally.
    pub fn xrun_handle_trigger(&mut self, id: PipelineId, cmd: TriggerCmd) -> Result<Flow> {
        let p = self.pipeline(id)?;
        if p.xrun_bytes == 0 || p.status != ComponentState::Paused {
            return Ok(Flow::Continue);
        }

        match cmd {
            TriggerCmd::Start => {
                tracing::info!(pipeline = %id, "in xrun, preparing before start");
                let host = self.host_endpoint(id)?;
                self.pipeline_prepare(id, host)?;
                self.pipeline_mut(id)?.xrun_bytes = 0;
                Ok(Flow::Continue)
            }
            TriggerCmd::Stop => {
                tracing::debug!(pipeline = %id, "already stopped in xrun");
                Ok(Flow::PathStop)
            }
            _ => Ok(Flow::Continue),
        }
    }

    /// Propagates `cmd` from `host` on the executing core.
    pub fn trigger_local(&mut self, id: PipelineId, host: ComponentId, cmd: TriggerCmd) -> Result<Flow> {
        self.pipeline(id)?;
        let dev = &self.comp(host)?.dev;
        let dir = dev.direction().walk_direction();

        let mut ctx = TriggerCtx {
            pipeline: id,
            start: host,
            start_pipeline: dev.pipeline(),
            cmd,
            handled: false,
        };
        let flow = trigger_visit(self, &mut ctx, host, dir).inspect_err(|e| {
            tracing::error!(pipeline = %id, comp = %host, ?cmd, error = %e, "trigger failed");
        })?;

        // The scheduling component may live in a neighbour pipeline.
        if !ctx.handled {
            self.pipeline_mut(id)?.status = status_after(cmd);
        }
        tracing::debug!(pipeline = %id, ?cmd, "pipeline triggered");
        Ok(flow)
    }

    /// Scheduling side of a trigger. Returns true if `comp` is the
    /// scheduling component of pipeline `id` and the command was handled.
    fn sched_comp_trigger(&mut self, id: PipelineId, comp: ComponentId, cmd: TriggerCmd) -> bool {
        let Some(p) = self.pipelines.get(id.0) else {
            return false;
        };
        if p.desc.sched_comp != comp {
            return false;
        }
        let timer_driven = p.desc.timer_driven;
        let playback = self
            .comps
            .get(comp.0)
            .is_some_and(|c| c.dev.direction() == StreamDirection::Playback);

        match cmd {
            TriggerCmd::Pause | TriggerCmd::Stop | TriggerCmd::Xrun => {
                self.schedule_cancel(id);
            }
            TriggerCmd::Start | TriggerCmd::Release => {
                // Capture is only scheduled here when timer driven.
                if playback || timer_driven {
                    self.schedule_copy_idle(id);
                }
            }
            TriggerCmd::Prepare | TriggerCmd::Reset => return false,
        }

        let Some(p) = self.pipelines.get_mut(id.0) else {
            return false;
        };
        if matches!(cmd, TriggerCmd::Start | TriggerCmd::Release) {
            p.xrun_bytes = 0;
        }
        p.status = status_after(cmd);
        true
    }

    /// Returns every component reached from `host` to `Ready`.
    pub fn pipeline_reset(&mut self, id: PipelineId, host: ComponentId) -> Result<Flow> {
        self.pipeline(id)?;
        let direction = self.comp(host)?.dev.direction();

        let mut ctx = ResetCtx { start: host, direction };
        let flow = reset_visit(self, &mut ctx, host, direction.walk_direction()).inspect_err(|e| {
            tracing::error!(pipeline = %id, comp = %host, error = %e, "reset failed");
        })?;

        self.schedule_cancel(id);
        let p = self.pipeline_mut(id)?;
        p.status = ComponentState::Ready;
        p.xrun_bytes = 0;
        p.preload = false;
        tracing::debug!(pipeline = %id, "pipeline reset");
        Ok(flow)
    }

    /// Host position, then the position of the first active DAI reached from
    /// `host`.
    pub fn pipeline_timestamp(&mut self, id: PipelineId, host: ComponentId) -> Result<StreamPosition> {
        let period_us = self.pipeline(id)?.desc.period_us;
        let comp = self.comp(host)?;
        let dir = comp.dev.direction().walk_direction();

        let mut posn = StreamPosition::default();
        comp.driver.position(&comp.dev, &mut posn);
        posn.wallclock_us = self.platform.clock.now_us();

        let mut ctx = TimestampCtx {
            start: host,
            posn,
            found: false,
        };
        timestamp_visit(self, &mut ctx, host, dir)?;

        let mut posn = ctx.posn;
        posn.timestamp_ns = period_us * 1000;
        Ok(posn)
    }

    /// Queues a copy `start_us` from now if the scheduling component is running.
    pub fn schedule_copy(&self, id: PipelineId, start_us: u64) {
        let Some(p) = self.pipelines.get(id.0) else {
            return;
        };
        let running = self
            .comps
            .get(p.desc.sched_comp.0)
            .is_some_and(|c| c.dev.is_active());
        if running {
            self.platform
                .scheduler
                .schedule(p.task(), start_us, p.desc.period_us, ScheduleFlags::Normal);
        }
    }

    /// Queues a copy for the next idle slot.
    pub fn schedule_copy_idle(&self, id: PipelineId) {
        if let Some(p) = self.pipelines.get(id.0) {
            self.platform
                .scheduler
                .schedule(p.task(), 0, p.desc.period_us, ScheduleFlags::Idle);
        }
    }

    /// Cancels the pipeline task. Failure is logged, never propagated.
    pub fn schedule_cancel(&self, id: PipelineId) {
        if !self.platform.scheduler.cancel(TaskId::from(id)) {
            tracing::error!(pipeline = %id, "task cancel failed");
        }
    }
}
