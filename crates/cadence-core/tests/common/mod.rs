//! Shared fixtures for cadence-core integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use cadence_core::{
    BufferDescriptor, BufferId, CacheController, ComponentDescriptor, ComponentDev,
    ComponentDriver, ComponentId, CopyContext, Direction, DriverInfo, DriverRegistry, Engine,
    EndpointRole, EngineConfig, Flow, HostNotifier, ManualScheduler, PipelineDescriptor,
    PipelineId, Platform, RecordingCache, RecordingNotifier, Result, StateChange, StreamDirection,
    StreamPosition, TriggerCmd,
};

/// Host endpoint: produces a period of silence (playback) or drains its
/// input (capture).
#[derive(Default)]
struct TestHost {
    bytes: u64,
}

impl ComponentDriver for TestHost {
    fn copy(&mut self, dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow> {
        let period = dev.period_bytes();
        let moved = match dev.direction() {
            StreamDirection::Playback => io.sink().map_or(0, |sink| sink.write_silence(period)),
            StreamDirection::Capture => io.source().map_or(0, |src| {
                let avail = src.avail();
                src.consume(avail)
            }),
        };
        self.bytes += moved as u64;
        Ok(Flow::Continue)
    }

    fn position(&self, _dev: &ComponentDev, posn: &mut StreamPosition) {
        posn.host_posn = self.bytes;
    }
}

/// DAI endpoint that reports an XRUN of `xrun_bytes` on its `xrun_after`th
/// copy.
struct TestDai {
    copies: i64,
    xrun_after: Option<i64>,
    xrun_bytes: u32,
    bytes: u64,
}

impl ComponentDriver for TestDai {
    fn copy(&mut self, dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow> {
        self.copies += 1;
        if self.xrun_after == Some(self.copies) {
            io.report_xrun(self.xrun_bytes);
            return Ok(Flow::Continue);
        }
        let period = dev.period_bytes();
        let moved = match dev.direction() {
            StreamDirection::Playback => io.source().map_or(0, |src| src.consume(period)),
            StreamDirection::Capture => io.sink().map_or(0, |sink| sink.write_silence(period)),
        };
        self.bytes += moved as u64;
        Ok(Flow::Continue)
    }

    fn position(&self, _dev: &ComponentDev, posn: &mut StreamPosition) {
        posn.dai_posn = self.bytes;
    }
}

/// Moves whatever fits from the first input to the first output. A running
/// node stays running when a second stream is prepared through it.
struct TestNode;

impl ComponentDriver for TestNode {
    fn prepare(&mut self, dev: &mut ComponentDev) -> Result<Flow> {
        if dev.is_active() {
            return Ok(Flow::PathStop);
        }
        dev.set_state(TriggerCmd::Prepare).map(StateChange::flow)
    }

    fn copy(&mut self, _dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow> {
        if let Some(limits) = io.limits() {
            io.transfer(limits.source_bytes);
        }
        Ok(Flow::Continue)
    }
}

fn host(_desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
    Ok(Box::new(TestHost::default()))
}

fn dai(desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
    Ok(Box::new(TestDai {
        copies: 0,
        xrun_after: desc.option("xrun_after"),
        xrun_bytes: desc.option("xrun_bytes").unwrap_or(128) as u32,
        bytes: 0,
    }))
}

fn node(_desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
    Ok(Box::new(TestNode))
}

/// Registry with `host`, `dai` and `node` test drivers.
pub fn registry() -> Arc<DriverRegistry> {
    let registry = DriverRegistry::new();
    let entries: [(&'static str, EndpointRole, cadence_core::DriverFactory); 3] = [
        ("host", EndpointRole::Host, host),
        ("dai", EndpointRole::Dai, dai),
        ("node", EndpointRole::Node, node),
    ];
    for (kind, role, factory) in entries {
        registry.register(
            DriverInfo {
                kind,
                name: kind,
                description: "test driver",
                role,
            },
            factory,
        );
    }
    Arc::new(registry)
}

/// An engine on simulated time with recording collaborators.
pub struct Rig {
    pub engine: Arc<Engine>,
    pub sched: Arc<ManualScheduler>,
    pub notifier: Arc<RecordingNotifier>,
    pub cache: Arc<RecordingCache>,
}

impl Rig {
    pub fn new(cores: u32) -> Self {
        let sched = Arc::new(ManualScheduler::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let cache = Arc::new(RecordingCache::new());
        let platform = Platform::simulated(sched.clone())
            .with_notifier(notifier.clone() as Arc<dyn HostNotifier>)
            .with_cache(cache.clone() as Arc<dyn CacheController>);
        let engine = Arc::new(Engine::new(EngineConfig { cores }, registry(), platform));
        Self {
            engine,
            sched,
            notifier,
            cache,
        }
    }

    /// Advances simulated time, running due pipeline tasks.
    pub fn advance(&self, us: u64) -> usize {
        self.sched.advance(us, |task| self.engine.run_task(task))
    }
}

/// Component IDs of a `host -> node -> dai` chain.
#[derive(Clone, Copy, Debug)]
pub struct Chain {
    pub pipeline: PipelineId,
    pub host: ComponentId,
    pub node: ComponentId,
    pub dai: ComponentId,
}

impl Chain {
    pub fn ids(&self) -> [ComponentId; 3] {
        [self.host, self.node, self.dai]
    }
}

/// Builds and completes a three-component chain numbered from `base`.
///
/// Playback runs host -> node -> dai, capture dai -> node -> host. The DAI is
/// the scheduling component.
pub fn chain(
    engine: &Engine,
    pipeline: u32,
    base: u32,
    direction: StreamDirection,
    desc: PipelineDescriptor,
    dai_options: &[(&str, i64)],
) -> Chain {
    let comp = |id: u32, kind: &str| {
        ComponentDescriptor::new(id, kind, pipeline)
            .with_direction(direction)
            .with_core(desc.core.0)
    };
    let mut dai_desc = comp(base + 2, "dai");
    for (name, value) in dai_options {
        dai_desc = dai_desc.with_option(*name, *value);
    }
    let host = engine.comp_new(&comp(base, "host")).unwrap();
    let node = engine.comp_new(&comp(base + 1, "node")).unwrap();
    let dai = engine.comp_new(&dai_desc).unwrap();

    let order = match direction {
        StreamDirection::Playback => [host, node, dai],
        StreamDirection::Capture => [dai, node, host],
    };
    for (i, pair) in order.windows(2).enumerate() {
        let buf = BufferId(base + 10 + i as u32);
        engine
            .buffer_new(&BufferDescriptor::new(buf.0, pipeline, 768))
            .unwrap();
        engine.connect(pair[0], buf, Direction::Downstream).unwrap();
        engine.connect(pair[1], buf, Direction::Upstream).unwrap();
    }

    engine.pipeline_new(desc).unwrap();
    engine
        .complete(PipelineId(pipeline), order[0], order[2])
        .unwrap();
    Chain {
        pipeline: PipelineId(pipeline),
        host,
        node,
        dai,
    }
}

/// A default timer-driven descriptor for `pipeline` scheduled by `sched_comp`.
pub fn descriptor(pipeline: u32, sched_comp: u32) -> PipelineDescriptor {
    PipelineDescriptor::new(pipeline, sched_comp)
}
