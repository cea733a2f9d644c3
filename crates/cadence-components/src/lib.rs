//! Cadence Components - built-in component drivers
//!
//! Drivers for the component types a topology can name:
//!
//! - [`HostDriver`] (`host`) - Host memory endpoint, simulated DMA
//! - [`DaiDriver`] (`dai`) - Audio port endpoint; detects underruns and overruns
//! - [`VolumeDriver`] (`volume`) - Fixed gain in percent
//! - [`MixerDriver`] (`mixer`) - Sums several streams into one
//! - [`SrcDriver`] (`src`) - Zero-order-hold sample rate conversion
//!
//! ## Example
//!
//! ```rust,ignore
//! use cadence_core::DriverRegistry;
//!
//! let registry = DriverRegistry::new();
//! cadence_components::register_builtin(&registry);
//! assert!(registry.get("mixer").is_some());
//! ```

use cadence_core::{DriverFactory, DriverInfo, DriverRegistry};

pub mod dai;
pub mod host;
pub mod mixer;
pub mod pcm;
pub mod src;
pub mod volume;

// Re-export main types at crate root
pub use dai::DaiDriver;
pub use host::HostDriver;
pub use mixer::MixerDriver;
pub use src::SrcDriver;
pub use volume::VolumeDriver;

/// Every built-in driver with its factory.
pub const BUILTIN: [(DriverInfo, DriverFactory); 5] = [
    (host::INFO, host::create),
    (dai::INFO, dai::create),
    (volume::INFO, volume::create),
    (mixer::INFO, mixer::create),
    (src::INFO, src::create),
];

/// Registers every built-in driver with `registry`.
pub fn register_builtin(registry: &DriverRegistry) {
    for (info, factory) in BUILTIN {
        registry.register(info, factory);
    }
}

/// A registry holding only the built-in drivers.
pub fn builtin_registry() -> DriverRegistry {
    let registry = DriverRegistry::new();
    register_builtin(&registry);
    registry
}
