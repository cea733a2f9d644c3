//! Topology validation command.

use cadence_config::validate_topology;
use clap::Args;

use super::common::{load_topology, registry};

#[derive(Args)]
pub struct ValidateArgs {
    /// Topology file or factory topology name
    #[arg(value_name = "TOPOLOGY")]
    topology: String,
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let topo = load_topology(&args.topology)?;
    validate_topology(&topo, &registry())
        .map_err(|e| anyhow::anyhow!("topology '{}' is invalid: {e}", topo.name))?;

    println!(
        "{}: ok ({} pipelines, {} components, {} buffers, {} streams)",
        topo.name,
        topo.pipelines.len(),
        topo.components.len(),
        topo.buffers.len(),
        topo.streams.len()
    );
    Ok(())
}
