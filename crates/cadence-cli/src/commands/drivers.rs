//! Driver listing command.

use clap::Args;

use super::common::registry;

#[derive(Args)]
pub struct DriversArgs {}

pub fn run(_args: DriversArgs) -> anyhow::Result<()> {
    let registry = registry();

    println!("Component Drivers");
    println!("=================");
    println!();
    for info in registry.drivers() {
        let role = format!("{:?}", info.role).to_lowercase();
        println!("  {:8} {:6} - {}", info.kind, role, info.description);
    }
    Ok(())
}
