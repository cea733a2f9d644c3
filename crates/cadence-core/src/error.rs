//! Error types for pipeline engine operations.
//!
//! Every lifecycle call returns `Result<_, PipelineError>`. The early
//! termination sentinel used by graph walks is deliberately not part of this
//! enum: it travels as [`Flow::PathStop`](crate::Flow::PathStop) inside `Ok`.

use thiserror::Error;

use crate::component::{ComponentId, ComponentState, TriggerCmd};
use crate::buffer::BufferId;
use crate::cpu::CoreId;
use crate::graph::PipelineId;

/// Errors that can occur while building or running pipelines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// No driver is registered for the requested component type.
    #[error("unknown component type: {0}")]
    UnknownComponentType(String),

    /// Arena or buffer storage could not be grown.
    #[error("out of memory")]
    OutOfMemory,

    /// A command is not valid in the component's current state.
    #[error("component {id}: {cmd:?} is invalid in state {state:?}")]
    InvalidState {
        /// Component that rejected the command.
        id: ComponentId,
        /// Command that was requested.
        cmd: TriggerCmd,
        /// State the component was in (unchanged).
        state: ComponentState,
    },

    /// An operation is not valid for the pipeline's current status.
    #[error("pipeline {id}: operation invalid in status {status:?}")]
    InvalidPipelineState {
        /// Pipeline that rejected the operation.
        id: PipelineId,
        /// Status the pipeline was in.
        status: ComponentState,
    },

    /// `complete()` was called on a pipeline that is no longer in `Init`.
    #[error("pipeline {0} already completed")]
    AlreadyCompleted(PipelineId),

    /// The pipeline or component is still in use.
    #[error("pipeline {0} busy")]
    Busy(PipelineId),

    /// A component cannot be freed while a pipeline still owns it.
    #[error("component {0} still owned by a pipeline")]
    ComponentBusy(ComponentId),

    /// The pipeline has not been completed yet.
    #[error("pipeline {0} not completed")]
    NotCompleted(PipelineId),

    /// The target core of a cross-core dispatch is not enabled.
    #[error("core {0} is not enabled")]
    InvalidCore(CoreId),

    /// Cross-core dispatch failed.
    #[error("cross-core dispatch failed: {0}")]
    ChannelError(String),

    /// The component ID is not known to the engine.
    #[error("component {0} not found")]
    ComponentNotFound(ComponentId),

    /// The buffer ID is not known to the engine.
    #[error("buffer {0} not found")]
    BufferNotFound(BufferId),

    /// The pipeline ID is not known to the engine.
    #[error("pipeline {0} not found")]
    PipelineNotFound(PipelineId),

    /// The buffer already has a component attached on the requested side.
    #[error("buffer {0} already connected on that side")]
    BufferInUse(BufferId),

    /// An object with the same ID already exists.
    #[error("duplicate id {0}")]
    DuplicateId(u32),

    /// A driver reported a failure of its own.
    #[error("component {id}: {reason}")]
    Component {
        /// Component whose driver failed.
        id: ComponentId,
        /// Driver-supplied description.
        reason: String,
    },
}

impl PipelineError {
    /// Create a driver failure for component `id`.
    pub fn component(id: ComponentId, reason: impl Into<String>) -> Self {
        PipelineError::Component {
            id,
            reason: reason.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = core::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_display_names_component_and_state() {
        let err = PipelineError::InvalidState {
            id: ComponentId(4),
            cmd: TriggerCmd::Start,
            state: ComponentState::Ready,
        };
        let msg = err.to_string();
        assert!(msg.contains("component 4"), "got: {msg}");
        assert!(msg.contains("Start"), "got: {msg}");
        assert!(msg.contains("Ready"), "got: {msg}");
    }

    #[test]
    fn component_factory_produces_correct_variant() {
        let err = PipelineError::component(ComponentId(2), "dma stalled");
        assert_eq!(err.to_string(), "component 2: dma stalled");
    }

    #[test]
    fn unknown_type_display() {
        let err = PipelineError::UnknownComponentType("eq-iir".to_string());
        assert_eq!(err.to_string(), "unknown component type: eq-iir");
    }
}
