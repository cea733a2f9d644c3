//! Copy cycle, XRUN detection and recovery, and the scheduler task body.

use crate::buffer::CopyContext;
use crate::component::{Component, ComponentId, ComponentState, EndpointRole, Flow, TriggerCmd};
use crate::cpu::{current_core, set_current_core};
use crate::error::{PipelineError, Result};
use crate::notify::XrunNotification;
use crate::schedule::TaskId;
use crate::stream::{Direction, StreamDirection, StreamPosition};

use super::{Graph, PipelineId};

struct CopyCtx {
    pipeline: PipelineId,
    start: ComponentId,
}

/// Capture copies before descending (pre-order), playback after (post-order).
fn copy_visit(g: &mut Graph, ctx: &mut CopyCtx, current: ComponentId, dir: Direction) -> Result<Flow> {
    let comp = g.comp(current)?;
    let owner = comp.dev.pipeline();
    let active = comp.dev.is_active();
    let single = g.is_single_pipeline(current, ctx.start);
    let same_sched = g.is_same_sched(owner, Some(ctx.pipeline));

    if !single && !same_sched {
        tracing::trace!(comp = %current, "copy: component from another pipeline");
        return Ok(Flow::Continue);
    }
    if !active {
        tracing::trace!(comp = %current, "copy: component not active");
        return Ok(Flow::Continue);
    }

    if dir == Direction::Downstream && g.comp_copy(current)? == Flow::PathStop {
        return Ok(Flow::PathStop);
    }

    let flow = g.for_each_comp(current, dir, ctx, copy_visit, None)?;
    if flow == Flow::PathStop {
        return Ok(Flow::PathStop);
    }

    if dir == Direction::Upstream {
        return g.comp_copy(current);
    }
    Ok(flow)
}

struct XrunCtx {
    pipeline: PipelineId,
    posn: StreamPosition,
    notified: usize,
}

fn xrun_visit(g: &mut Graph, ctx: &mut XrunCtx, current: ComponentId, dir: Direction) -> Result<Flow> {
    let comp = g.comp(current)?;
    if comp.dev.role() == EndpointRole::Host {
        comp.driver.position(&comp.dev, &mut ctx.posn);
        ctx.posn.wallclock_us = g.platform.clock.now_us();
        g.platform.notifier.xrun(XrunNotification {
            pipeline: ctx.pipeline,
            host: current,
            posn: ctx.posn,
        });
        ctx.notified += 1;
    }

    g.for_each_comp(current, dir, ctx, xrun_visit, None)
}

impl Graph {
    /// Runs one component's driver copy and raises any XRUN it reported.
    pub fn comp_copy(&mut self, id: ComponentId) -> Result<Flow> {
        let Graph { comps, buffers, .. } = self;
        let Component {
            dev,
            driver,
            sources,
            sinks,
        } = comps
            .get_mut(id.0)
            .ok_or(PipelineError::ComponentNotFound(id))?;

        let mut io = CopyContext::new(sources, sinks, buffers);
        let result = driver.copy(dev, &mut io);
        let xrun = io.take_xrun();

        if let Some(bytes) = xrun {
            self.pipeline_xrun(id, bytes);
        }
        result
    }

    /// Moves one period of audio through the pipeline.
    pub fn pipeline_copy(&mut self, id: PipelineId) -> Result<Flow> {
        let p = self.pipeline(id)?;
        let (Some(source), Some(sink), preload) = (p.source, p.sink, p.preload) else {
            return Err(PipelineError::NotCompleted(id));
        };

        let (start, dir) = match self.comp(source)?.dev.direction() {
            StreamDirection::Playback if preload => (sink, Direction::Upstream),
            StreamDirection::Playback => {
                self.comp_copy(sink).inspect_err(|e| {
                    tracing::error!(pipeline = %id, comp = %sink, error = %e, "sink copy failed");
                })?;
                match self.previous(sink, Direction::Upstream) {
                    Some(prev) => (prev, Direction::Upstream),
                    None => return Ok(Flow::Continue),
                }
            }
            StreamDirection::Capture => (source, Direction::Downstream),
        };

        let mut ctx = CopyCtx { pipeline: id, start };
        let result = copy_visit(self, &mut ctx, start, dir);
        if let Err(e) = &result {
            tracing::error!(pipeline = %id, comp = %start, ?dir, error = %e, "copy failed");
        }

        // Preload ends only once a walk gets all the way through.
        if result != Ok(Flow::PathStop)
            && let Ok(p) = self.pipeline_mut(id)
        {
            p.preload = false;
        }
        result
    }

    /// Raises an XRUN of `bytes` reported by component `id`.
    ///
    /// Ignored while the owning pipeline is already in XRUN or when the
    /// reporting component is not running. Otherwise every component is forced
    /// to `Ready` with an `Xrun` trigger, the XRUN size is recorded, and every
    /// host endpoint towards the host side is notified once.
    pub fn pipeline_xrun(&mut self, id: ComponentId, bytes: u32) {
        let Some(comp) = self.comps.get(id.0) else {
            return;
        };
        let Some(pipeline) = comp.dev.pipeline() else {
            tracing::warn!(comp = %id, bytes, "xrun from component outside any pipeline");
            return;
        };
        let state = comp.dev.state();
        let notify_dir = comp.dev.direction().walk_direction().reverse();

        let Some(p) = self.pipelines.get(pipeline.0) else {
            return;
        };
        if p.xrun_bytes != 0 {
            tracing::trace!(pipeline = %pipeline, comp = %id, bytes, "xrun already pending");
            return;
        }
        if state != ComponentState::Active {
            return;
        }

        tracing::warn!(pipeline = %pipeline, comp = %id, bytes, "xrun");
        match self.host_endpoint(pipeline) {
            Ok(host) => {
                if let Err(e) = self.trigger_local(pipeline, host, TriggerCmd::Xrun) {
                    tracing::error!(pipeline = %pipeline, error = %e, "xrun trigger failed");
                }
            }
            Err(e) => tracing::error!(pipeline = %pipeline, error = %e, "xrun on incomplete pipeline"),
        }

        if let Some(p) = self.pipelines.get_mut(pipeline.0) {
            p.xrun_bytes = bytes.max(1);
            p.xrun_count += 1;
        }

        let mut ctx = XrunCtx {
            pipeline,
            posn: StreamPosition {
                xrun_comp_id: Some(id),
                xrun_size: bytes,
                ..StreamPosition::default()
            },
            notified: 0,
        };
        if let Err(e) = xrun_visit(self, &mut ctx, id, notify_dir) {
            tracing::error!(pipeline = %pipeline, error = %e, "xrun notification failed");
        }
        tracing::debug!(pipeline = %pipeline, hosts = ctx.notified, "xrun notified");
    }

    /// Prepares and restarts a pipeline after an XRUN.
    pub fn xrun_recover(&mut self, id: PipelineId) -> Result<()> {
        tracing::warn!(pipeline = %id, "xrun recovery");
        let host = self.host_endpoint(id)?;

        self.pipeline_prepare(id, host).inspect_err(|e| {
            tracing::error!(pipeline = %id, error = %e, "xrun recovery: prepare failed");
        })?;
        self.pipeline_mut(id)?.xrun_bytes = 0;

        self.trigger_local(id, host, TriggerCmd::Start).inspect_err(|e| {
            tracing::error!(pipeline = %id, error = %e, "xrun recovery: restart failed");
        })?;
        Ok(())
    }

    /// Scheduler callback. Returns the delay to the next run in
    /// microseconds, or 0 to stop.
    ///
    /// Executes as the pipeline's owning core.
    pub fn run_task(&mut self, task: TaskId) -> u64 {
        let id = PipelineId::from(task);
        let Ok(p) = self.pipeline(id) else {
            tracing::warn!(%task, "run of unknown pipeline task");
            return 0;
        };

        let caller = current_core();
        set_current_core(p.desc.core);
        let delay = self.run_task_on_core(id);
        set_current_core(caller);
        delay
    }

    fn run_task_on_core(&mut self, id: PipelineId) -> u64 {
        let Ok(p) = self.pipeline(id) else {
            return 0;
        };

        if p.xrun_bytes != 0 {
            if self.xrun_recover(id).is_err() {
                return 0;
            }
        } else if p.status != ComponentState::Active {
            tracing::trace!(pipeline = %id, status = ?p.status, "stale run skipped");
            return 0;
        }

        if self.pipeline_copy(id).is_err() && self.xrun_recover(id).is_err() {
            tracing::error!(pipeline = %id, "xrun recovery failed, host must stop the pipeline");
            return 0;
        }

        let Ok(p) = self.pipeline_mut(id) else {
            return 0;
        };
        p.copy_count += 1;
        if p.desc.timer_driven || p.preload {
            p.desc.period_us
        } else {
            0
        }
    }
}
