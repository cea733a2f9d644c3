//! Factory topology listing command.

use cadence_config::factory_topologies;
use clap::Args;

#[derive(Args)]
pub struct TopologiesArgs {}

pub fn run(_args: TopologiesArgs) -> anyhow::Result<()> {
    println!("Factory Topologies");
    println!("==================");
    println!();
    for topo in factory_topologies() {
        println!(
            "  {:14} {} core(s), {} pipeline(s) - {}",
            topo.name,
            topo.cores,
            topo.pipelines.len(),
            topo.description.as_deref().unwrap_or("")
        );
    }
    println!();
    println!("Use 'cadence run <name>' to stream one on simulated time.");
    Ok(())
}
