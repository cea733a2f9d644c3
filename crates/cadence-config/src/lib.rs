//! Topology configuration for the cadence pipeline engine.
//!
//! A topology file stands in for the descriptor stream a host sends to the
//! firmware: it names every pipeline, component, and buffer, plus the host
//! streams to open once the graph is built.
//!
//! # Features
//!
//! - **Topology files**: Load and save topologies as TOML
//! - **Validation**: Check kinds, IDs, references and core placement against
//!   a driver registry before touching an engine
//! - **Building**: Create a topology in an [`Engine`](cadence_core::Engine)
//!   and drive its streams
//! - **Factory topologies**: Built-in graphs for common use cases
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_config::{Topology, get_factory_topology};
//!
//! let topo = Topology::load("speaker.toml")?;
//! let built = topo.build(&engine)?;
//! built.start(&engine)?;
//! ```

mod build;
mod error;
mod topology;

/// Topology validation.
pub mod validation;

/// Factory topologies bundled with the library.
pub mod factory_topologies;

pub use build::{BuiltStream, BuiltTopology};
pub use error::ConfigError;
pub use factory_topologies::{
    FACTORY_TOPOLOGY_NAMES, factory_topologies, get_factory_topology, is_factory_topology,
};
pub use topology::{
    BufferConfig, ComponentConfig, DirectionConfig, FormatConfig, PipelineConfig, StreamConfig,
    Topology,
};
pub use validation::{ValidationError, ValidationResult, validate_topology};

use std::path::Path;

/// Loads `name_or_path` as a topology file if it exists, otherwise as a
/// factory topology name.
pub fn find_topology(name_or_path: &str) -> Result<Topology, ConfigError> {
    let path = Path::new(name_or_path);
    if path.is_file() {
        return Topology::load(path);
    }
    get_factory_topology(name_or_path)
        .ok_or_else(|| ConfigError::TopologyNotFound(name_or_path.to_string()))
}
