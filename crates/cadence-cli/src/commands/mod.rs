//! CLI command implementations.

pub mod common;
pub mod drivers;
pub mod run;
pub mod topologies;
pub mod validate;
