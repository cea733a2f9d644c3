//! Criterion benchmarks for the pipeline copy cycle.
//!
//! Measures walk and dispatch overhead on chains of trivial pass-through
//! components, so the numbers reflect the engine rather than DSP cost.
//!
//! Run with: `cargo bench -p cadence-core`
#![allow(missing_docs)]

use std::sync::Arc;

use cadence_core::{
    BufferDescriptor, BufferId, ComponentDescriptor, ComponentDev, ComponentDriver, ComponentId,
    CopyContext, Direction, DriverInfo, DriverRegistry, EndpointRole, Engine, EngineConfig, Flow,
    ManualScheduler, PipelineDescriptor, PipelineId, Platform, Result, StreamDirection, TaskId,
    TriggerCmd,
};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

const CHAIN_LENGTHS: &[u32] = &[2, 8, 32, 128];

struct Source;

impl ComponentDriver for Source {
    fn copy(&mut self, dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow> {
        let period = dev.period_bytes();
        if let Some(sink) = io.sink() {
            sink.write_silence(period);
        }
        Ok(Flow::Continue)
    }
}

struct Pass;

impl ComponentDriver for Pass {
    fn copy(&mut self, _dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow> {
        if let Some(limits) = io.limits() {
            io.transfer(limits.source_bytes);
        }
        Ok(Flow::Continue)
    }
}

struct Drain;

impl ComponentDriver for Drain {
    fn copy(&mut self, _dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow> {
        if let Some(src) = io.source() {
            let avail = src.avail();
            src.consume(avail);
        }
        Ok(Flow::Continue)
    }
}

fn source(_desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
    Ok(Box::new(Source))
}

fn pass(_desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
    Ok(Box::new(Pass))
}

fn drain(_desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
    Ok(Box::new(Drain))
}

fn registry() -> Arc<DriverRegistry> {
    let registry = DriverRegistry::new();
    let entries: [(&'static str, EndpointRole, cadence_core::DriverFactory); 3] = [
        ("host", EndpointRole::Host, source),
        ("pass", EndpointRole::Node, pass),
        ("dai", EndpointRole::Dai, drain),
    ];
    for (kind, role, factory) in entries {
        registry.register(
            DriverInfo {
                kind,
                name: kind,
                description: "bench driver",
                role,
            },
            factory,
        );
    }
    Arc::new(registry)
}

/// Builds and starts a playback chain of `len` components.
fn running_chain(len: u32, direction: StreamDirection) -> (Engine, Arc<ManualScheduler>) {
    let sched = Arc::new(ManualScheduler::new());
    let engine = Engine::new(EngineConfig::default(), registry(), Platform::simulated(sched.clone()));

    let (first, last) = match direction {
        StreamDirection::Playback => ("host", "dai"),
        StreamDirection::Capture => ("dai", "host"),
    };
    for id in 1..=len {
        let kind = match id {
            1 => first,
            _ if id == len => last,
            _ => "pass",
        };
        let desc = ComponentDescriptor::new(id, kind, 1).with_direction(direction);
        engine.comp_new(&desc).unwrap();
    }
    for id in 1..len {
        let buf = BufferId(1000 + id);
        engine.buffer_new(&BufferDescriptor::new(buf.0, 1, 4096)).unwrap();
        engine.connect(ComponentId(id), buf, Direction::Downstream).unwrap();
        engine.connect(ComponentId(id + 1), buf, Direction::Upstream).unwrap();
    }
    engine
        .pipeline_new(PipelineDescriptor::new(1, len))
        .unwrap();
    engine
        .complete(PipelineId(1), ComponentId(1), ComponentId(len))
        .unwrap();

    let host = match direction {
        StreamDirection::Playback => ComponentId(1),
        StreamDirection::Capture => ComponentId(len),
    };
    engine.prepare(PipelineId(1), host).unwrap();
    engine.trigger(PipelineId(1), host, TriggerCmd::Start).unwrap();
    (engine, sched)
}

fn bench_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("copy");

    for &len in CHAIN_LENGTHS {
        for (name, direction) in [
            ("playback", StreamDirection::Playback),
            ("capture", StreamDirection::Capture),
        ] {
            group.bench_with_input(BenchmarkId::new(name, len), &len, |b, &len| {
                let (engine, _sched) = running_chain(len, direction);
                b.iter(|| black_box(engine.run_task(black_box(TaskId(1)))));
            });
        }
    }

    group.finish();
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");

    for &len in CHAIN_LENGTHS {
        group.bench_with_input(BenchmarkId::new("stop_start", len), &len, |b, &len| {
            let (engine, _sched) = running_chain(len, StreamDirection::Playback);
            let host = ComponentId(1);
            b.iter(|| {
                engine.trigger(PipelineId(1), host, TriggerCmd::Stop).unwrap();
                engine.trigger(PipelineId(1), host, TriggerCmd::Start).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_copy, bench_lifecycle);
criterion_main!(benches);
