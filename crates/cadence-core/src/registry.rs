//! Driver registry: component type tag to driver factory.
//!
//! The registry is created at startup, filled by the component crates (see
//! `cadence_components::register_builtin`), and shared with every
//! [`Engine`](crate::Engine) through an `Arc`. Lookups and updates are
//! serialized by a mutex; factories run with the lock released.

use parking_lot::Mutex;

use crate::component::{ComponentDescriptor, ComponentDriver, EndpointRole};
use crate::error::{PipelineError, Result};

/// Describes a registered driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    /// Type tag matched against [`ComponentDescriptor::kind`].
    pub kind: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Endpoint role of every component the driver creates.
    pub role: EndpointRole,
}

/// Factory function type for creating drivers.
pub type DriverFactory = fn(&ComponentDescriptor) -> Result<Box<dyn ComponentDriver>>;

struct RegistryEntry {
    info: DriverInfo,
    factory: DriverFactory,
}

/// Registry of component drivers.
#[derive(Default)]
pub struct DriverRegistry {
    entries: Mutex<Vec<RegistryEntry>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a driver. An existing driver with the same kind is replaced.
    pub fn register(&self, info: DriverInfo, factory: DriverFactory) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.info.kind == info.kind) {
            tracing::warn!(kind = info.kind, "driver re-registered");
            *entry = RegistryEntry { info, factory };
            return;
        }
        tracing::debug!(kind = info.kind, "driver registered");
        entries.push(RegistryEntry { info, factory });
    }

    /// Removes the driver for `kind`. Returns false if none was registered.
    ///
    /// Components already created by the driver are unaffected.
    pub fn unregister(&self, kind: &str) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.info.kind != kind);
        before != entries.len()
    }

    /// Creates a driver for `desc`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnknownComponentType`] if no driver is registered for
    /// `desc.kind`; any error the factory returns.
    pub fn create(&self, desc: &ComponentDescriptor) -> Result<(Box<dyn ComponentDriver>, EndpointRole)> {
        let found = self
            .entries
            .lock()
            .iter()
            .find(|e| e.info.kind == desc.kind)
            .map(|e| (e.factory, e.info.role));

        let Some((factory, role)) = found else {
            tracing::error!(comp = %desc.id, kind = %desc.kind, "no driver for component type");
            return Err(PipelineError::UnknownComponentType(desc.kind.clone()));
        };

        let driver = factory(desc).inspect_err(|e| {
            tracing::error!(comp = %desc.id, kind = %desc.kind, error = %e, "driver create failed");
        })?;
        Ok((driver, role))
    }

    /// Looks up a driver by kind.
    pub fn get(&self, kind: &str) -> Option<DriverInfo> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.info.kind == kind)
            .map(|e| e.info.clone())
    }

    /// Returns the descriptors of all registered drivers, in registration order.
    pub fn drivers(&self) -> Vec<DriverInfo> {
        self.entries.lock().iter().map(|e| e.info.clone()).collect()
    }

    /// Returns the number of registered drivers.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no drivers are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
