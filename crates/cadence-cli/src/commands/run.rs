//! Topology run command.
//!
//! Builds a topology into an engine backed by the simulated scheduler, starts
//! its streams, advances time by the requested number of periods and reports
//! what each pipeline did.

#![allow(clippy::print_literal)] // Table headers use literal strings

use std::sync::Arc;

use cadence_core::{
    CoreId, CoreWorker, Engine, EngineConfig, HostNotifier, ManualScheduler, Platform,
    RecordingNotifier,
};
use clap::Args;
use serde::Serialize;

use super::common::{load_topology, registry};

#[derive(Args)]
pub struct RunArgs {
    /// Topology file or factory topology name
    #[arg(value_name = "TOPOLOGY")]
    topology: String,

    /// Scheduling periods to run
    #[arg(short, long, default_value_t = 10)]
    periods: u64,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct PipelineReport {
    id: u32,
    core: u32,
    status: String,
    copies: u64,
    xruns: u64,
}

#[derive(Serialize)]
struct StreamReport {
    pipeline: u32,
    host: u32,
    rate: u32,
    host_posn: u64,
    dai_posn: u64,
}

#[derive(Serialize)]
struct RunReport {
    topology: String,
    periods: u64,
    elapsed_us: u64,
    notifications: usize,
    pipelines: Vec<PipelineReport>,
    streams: Vec<StreamReport>,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let topo = load_topology(&args.topology)?;

    let sched = Arc::new(ManualScheduler::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let platform = Platform::simulated(sched.clone())
        .with_notifier(notifier.clone() as Arc<dyn HostNotifier>);
    let engine = Arc::new(Engine::new(
        EngineConfig { cores: topo.cores },
        Arc::new(registry()),
        platform,
    ));

    let workers = (1..topo.cores)
        .map(|core| CoreWorker::spawn(engine.clone(), CoreId(core)))
        .collect::<Result<Vec<_>, _>>()?;

    let built = topo.build(&engine)?;
    built.start(&engine)?;

    let elapsed_us = args.periods * topo.max_period_us();
    let runs = sched.advance(elapsed_us, |task| engine.run_task(task));
    tracing::info!(topology = %topo.name, runs, elapsed_us, "simulation finished");

    let mut streams = Vec::with_capacity(built.streams.len());
    for s in &built.streams {
        let posn = engine.timestamp(s.pipeline, s.host)?;
        streams.push(StreamReport {
            pipeline: s.pipeline.0,
            host: s.host.0,
            rate: s.params.rate,
            host_posn: posn.host_posn,
            dai_posn: posn.dai_posn,
        });
    }
    let pipelines = engine
        .pipelines()
        .into_iter()
        .map(|info| PipelineReport {
            id: info.id.0,
            core: info.core.0,
            status: format!("{:?}", info.status).to_lowercase(),
            copies: info.copy_count,
            xruns: info.xrun_count,
        })
        .collect();

    built.stop(&engine)?;
    built.teardown(&engine)?;
    drop(workers);

    let report = RunReport {
        topology: topo.name.clone(),
        periods: args.periods,
        elapsed_us,
        notifications: notifier.xrun_count(),
        pipelines,
        streams,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Topology: {}", report.topology);
    println!("Simulated: {} periods ({} us)", report.periods, report.elapsed_us);
    println!();
    println!("  {:8}  {:4}  {:8}  {:>8}  {:>6}", "Pipeline", "Core", "Status", "Copies", "Xruns");
    for p in &report.pipelines {
        println!(
            "  {:8}  {:4}  {:8}  {:>8}  {:>6}",
            p.id, p.core, p.status, p.copies, p.xruns
        );
    }
    println!();
    println!("  {:8}  {:4}  {:>6}  {:>10}  {:>10}", "Pipeline", "Host", "Rate", "Host bytes", "DAI bytes");
    for s in &report.streams {
        println!(
            "  {:8}  {:4}  {:>6}  {:>10}  {:>10}",
            s.pipeline, s.host, s.rate, s.host_posn, s.dai_posn
        );
    }
    println!();
    println!("XRUN notifications: {}", report.notifications);
}
