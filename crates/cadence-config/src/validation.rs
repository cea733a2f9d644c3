//! Topology validation.
//!
//! Checks a [`Topology`] against a [`DriverRegistry`] before anything is
//! created in an engine, so a bad file fails as a whole with every problem
//! listed instead of leaving a half-built graph behind.
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_config::{get_factory_topology, validate_topology};
//!
//! let topo = get_factory_topology("playback").unwrap();
//! validate_topology(&topo, &registry)?;
//! ```

use std::collections::BTreeSet;

use cadence_core::{DriverRegistry, EndpointRole};
use thiserror::Error;

use crate::topology::Topology;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No driver is registered for a component's kind.
    #[error("component {id}: unknown kind '{kind}'")]
    UnknownKind {
        /// Component ID.
        id: u32,
        /// Unregistered kind.
        kind: String,
    },

    /// Two objects of the same category share an ID.
    #[error("duplicate {what} id {id}")]
    DuplicateId {
        /// `pipeline`, `component` or `buffer`.
        what: &'static str,
        /// Repeated ID.
        id: u32,
    },

    /// A reference names an object that is not declared.
    #[error("{owner}: references unknown {what} {id}")]
    Dangling {
        /// Object holding the reference.
        owner: String,
        /// Kind of object referenced.
        what: &'static str,
        /// Missing ID.
        id: u32,
    },

    /// A pipeline's source or sink is declared in another pipeline.
    #[error("pipeline {pipeline}: {role} component {comp} belongs to pipeline {actual}")]
    ForeignEndpoint {
        /// Pipeline being checked.
        pipeline: u32,
        /// `source` or `sink`.
        role: &'static str,
        /// Offending component.
        comp: u32,
        /// Pipeline the component is declared in.
        actual: u32,
    },

    /// A pipeline is placed on a core the topology does not have.
    #[error("pipeline {pipeline}: core {core} outside {cores} configured cores")]
    CoreOutOfRange {
        /// Pipeline being checked.
        pipeline: u32,
        /// Requested core.
        core: u32,
        /// Configured core count.
        cores: u32,
    },

    /// A stream does not start at a host endpoint of its pipeline.
    #[error("stream on pipeline {pipeline}: component {host} is not a host endpoint of it")]
    NotAHost {
        /// Stream pipeline.
        pipeline: u32,
        /// Named host component.
        host: u32,
    },

    /// A numeric setting is zero or otherwise unusable.
    #[error("{owner}: invalid {field}")]
    InvalidValue {
        /// Object holding the setting.
        owner: String,
        /// Field name.
        field: &'static str,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates `topo` against the drivers in `registry`.
///
/// Returns the single problem found, or [`ValidationError::Multiple`] when
/// there are several.
pub fn validate_topology(topo: &Topology, registry: &DriverRegistry) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if topo.cores == 0 {
        errors.push(ValidationError::InvalidValue {
            owner: format!("topology '{}'", topo.name),
            field: "cores",
        });
    }

    check_unique("pipeline", topo.pipelines.iter().map(|p| p.id), &mut errors);
    check_unique("component", topo.components.iter().map(|c| c.id), &mut errors);
    check_unique("buffer", topo.buffers.iter().map(|b| b.id), &mut errors);

    for c in &topo.components {
        let owner = format!("component {}", c.id);
        if registry.get(&c.kind).is_none() {
            errors.push(ValidationError::UnknownKind {
                id: c.id,
                kind: c.kind.clone(),
            });
        }
        if topo.pipeline(c.pipeline).is_none() {
            errors.push(dangling(owner, "pipeline", c.pipeline));
        }
    }

    for b in &topo.buffers {
        let owner = format!("buffer {}", b.id);
        if b.size == 0 {
            errors.push(ValidationError::InvalidValue {
                owner: owner.clone(),
                field: "size",
            });
        }
        if topo.pipeline(b.pipeline).is_none() {
            errors.push(dangling(owner.clone(), "pipeline", b.pipeline));
        }
        for end in [b.from, b.to] {
            if topo.component(end).is_none() {
                errors.push(dangling(owner.clone(), "component", end));
            }
        }
    }

    for p in &topo.pipelines {
        let owner = format!("pipeline {}", p.id);
        if p.core >= topo.cores {
            errors.push(ValidationError::CoreOutOfRange {
                pipeline: p.id,
                core: p.core,
                cores: topo.cores,
            });
        }
        if p.period_us == 0 {
            errors.push(ValidationError::InvalidValue {
                owner: owner.clone(),
                field: "period_us",
            });
        }
        if p.frames_per_sched == 0 {
            errors.push(ValidationError::InvalidValue {
                owner: owner.clone(),
                field: "frames_per_sched",
            });
        }
        for (role, id) in [("source", p.source), ("sink", p.sink)] {
            match topo.component(id) {
                None => errors.push(dangling(owner.clone(), "component", id)),
                Some(c) if c.pipeline != p.id => errors.push(ValidationError::ForeignEndpoint {
                    pipeline: p.id,
                    role,
                    comp: id,
                    actual: c.pipeline,
                }),
                Some(_) => {}
            }
        }
        if topo.component(p.sched_comp).is_none() {
            errors.push(dangling(owner, "component", p.sched_comp));
        }
    }

    for s in &topo.streams {
        let owner = format!("stream on pipeline {}", s.pipeline);
        if topo.pipeline(s.pipeline).is_none() {
            errors.push(dangling(owner.clone(), "pipeline", s.pipeline));
        }
        let is_host = topo.component(s.host).is_some_and(|c| {
            c.pipeline == s.pipeline
                && registry
                    .get(&c.kind)
                    .is_some_and(|info| info.role == EndpointRole::Host)
        });
        if !is_host {
            errors.push(ValidationError::NotAHost {
                pipeline: s.pipeline,
                host: s.host,
            });
        }
        if s.rate == 0 {
            errors.push(ValidationError::InvalidValue {
                owner: owner.clone(),
                field: "rate",
            });
        }
        if s.channels == 0 {
            errors.push(ValidationError::InvalidValue {
                owner,
                field: "channels",
            });
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

fn dangling(owner: String, what: &'static str, id: u32) -> ValidationError {
    ValidationError::Dangling { owner, what, id }
}

fn check_unique(what: &'static str, ids: impl Iterator<Item = u32>, errors: &mut Vec<ValidationError>) {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            errors.push(ValidationError::DuplicateId { what, id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{BufferConfig, ComponentConfig, PipelineConfig, StreamConfig};
    use cadence_core::{
        ComponentDescriptor, ComponentDev, ComponentDriver, CopyContext, DriverInfo, Flow, Result,
    };

    struct Inert;

    impl ComponentDriver for Inert {
        fn copy(&mut self, _dev: &mut ComponentDev, _io: &mut CopyContext<'_>) -> Result<Flow> {
            Ok(Flow::Continue)
        }
    }

    fn inert(_desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
        Ok(Box::new(Inert))
    }

    fn registry() -> DriverRegistry {
        let registry = DriverRegistry::new();
        for (kind, role) in [("host", EndpointRole::Host), ("dai", EndpointRole::Dai)] {
            registry.register(
                DriverInfo {
                    kind,
                    name: kind,
                    description: "",
                    role,
                },
                inert,
            );
        }
        registry
    }

    fn two_comp() -> Topology {
        Topology::new("t")
            .with_pipeline(PipelineConfig::new(1, 1, 2, 2))
            .with_component(ComponentConfig::new(1, "host", 1))
            .with_component(ComponentConfig::new(2, "dai", 1))
            .with_buffer(BufferConfig::new(10, 1, 768, 1, 2))
            .with_stream(StreamConfig::new(1, 1))
    }

    #[test]
    fn valid_topology_passes() {
        assert_eq!(validate_topology(&two_comp(), &registry()), Ok(()));
    }

    #[test]
    fn unknown_kind_is_reported() {
        let topo = two_comp().with_component(ComponentConfig::new(3, "reverb", 1));
        assert_eq!(
            validate_topology(&topo, &registry()),
            Err(ValidationError::UnknownKind {
                id: 3,
                kind: "reverb".to_string()
            })
        );
    }

    #[test]
    fn several_problems_are_collected() {
        let mut topo = two_comp().with_component(ComponentConfig::new(2, "dai", 1));
        topo.pipelines[0].core = 4;
        topo.buffers[0].to = 9;
        let Err(ValidationError::Multiple(errors)) = validate_topology(&topo, &registry()) else {
            panic!("expected multiple errors");
        };
        assert!(errors.contains(&ValidationError::DuplicateId {
            what: "component",
            id: 2
        }));
        assert!(errors.contains(&ValidationError::CoreOutOfRange {
            pipeline: 1,
            core: 4,
            cores: 1
        }));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Dangling { id: 9, .. })));
    }

    #[test]
    fn foreign_source_is_rejected() {
        let topo = two_comp()
            .with_pipeline(PipelineConfig::new(2, 1, 1, 2))
            .with_stream(StreamConfig::new(2, 1));
        let err = validate_topology(&topo, &registry()).unwrap_err();
        let ValidationError::Multiple(errors) = err else {
            panic!("expected multiple errors, got {err}");
        };
        assert!(errors.contains(&ValidationError::ForeignEndpoint {
            pipeline: 2,
            role: "source",
            comp: 1,
            actual: 1
        }));
        assert!(errors.contains(&ValidationError::NotAHost { pipeline: 2, host: 1 }));
    }

    #[test]
    fn shared_sched_comp_is_allowed() {
        let topo = two_comp()
            .with_component(ComponentConfig::new(21, "host", 2))
            .with_pipeline(PipelineConfig::new(2, 21, 21, 2));
        assert_eq!(validate_topology(&topo, &registry()), Ok(()));
    }

    #[test]
    fn stream_must_start_at_a_host() {
        let topo = two_comp().with_stream(StreamConfig::new(1, 2));
        assert_eq!(
            validate_topology(&topo, &registry()),
            Err(ValidationError::NotAHost { pipeline: 1, host: 2 })
        );
    }
}
