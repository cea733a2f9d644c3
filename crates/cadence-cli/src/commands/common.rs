//! Helpers shared by the commands.

use cadence_config::{Topology, find_topology};
use cadence_core::DriverRegistry;

/// Registry holding every built-in driver.
pub fn registry() -> DriverRegistry {
    cadence_components::builtin_registry()
}

/// Loads a topology file, or a factory topology by name.
pub fn load_topology(name_or_path: &str) -> anyhow::Result<Topology> {
    find_topology(name_or_path)
        .map_err(|e| anyhow::anyhow!("cannot load topology '{name_or_path}': {e}"))
}
