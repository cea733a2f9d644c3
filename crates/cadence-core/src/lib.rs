//! Cadence Core - pipeline execution engine for multi-core DSP firmware
//!
//! This crate runs audio processing graphs made of components joined by
//! buffers. Groups of components form pipelines; each pipeline is scheduled
//! on one core and moved through its lifecycle as a unit by walking the graph.
//!
//! # Core Abstractions
//!
//! ## Graph
//!
//! - [`ComponentDev`] - Generic half of a component: ID, role, state, params
//! - [`ComponentDriver`] - Object-safe trait implemented by every component type
//! - [`Buffer`] - Byte ring connecting one producer to one consumer
//! - [`CopyContext`] - A driver's view of its buffers during `copy`
//!
//! ## Lifecycle
//!
//! - [`Engine`] - Entry point for construction, params, prepare, trigger,
//!   reset, free and cache operations
//! - [`TriggerCmd`] / [`ComponentState`] - The component state machine
//! - [`Flow`] - Continue or stop the current walk path (never an error)
//!
//! ## Scheduling and Cores
//!
//! - [`Scheduler`] - Platform task runner, with [`ManualScheduler`] for
//!   deterministic simulation
//! - [`CoreWorker`] - Thread serving a secondary core's inter-core messages
//! - [`current_core`] / [`CoreSet`] - Executing core and enabled-core mask
//!
//! ## Platform Collaborators
//!
//! - [`CacheController`] - Writeback/invalidate around core handoffs
//! - [`HostNotifier`] - XRUN reports to the host
//! - [`DriverRegistry`] - Component type tag to driver factory
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_core::{Engine, EngineConfig, ManualScheduler, Platform, TriggerCmd};
//!
//! let sched = Arc::new(ManualScheduler::new());
//! let engine = Engine::new(EngineConfig::default(), registry, Platform::simulated(sched.clone()));
//!
//! // Components, buffers and a pipeline arrive from the host
//! engine.comp_new(&ComponentDescriptor::new(1, "host", 1))?;
//! // ...
//! engine.complete(PipelineId(1), ComponentId(1), ComponentId(3))?;
//!
//! engine.params(PipelineId(1), ComponentId(1), StreamParams::default())?;
//! engine.prepare(PipelineId(1), ComponentId(1))?;
//! engine.trigger(PipelineId(1), ComponentId(1), TriggerCmd::Start)?;
//!
//! // Advance simulated time; due pipeline tasks copy one period each
//! sched.advance(10_000, |task| engine.run_task(task));
//! ```
//!
//! # Design Principles
//!
//! - **Handles, not pointers**: components, buffers and pipelines live in
//!   arenas and refer to each other by ID
//! - **One lock per engine**: a walk never observes a half-applied operation
//! - **Early stop is not failure**: `Flow::PathStop` travels inside `Ok`

pub mod buffer;
pub mod cache;
pub mod component;
pub mod cpu;
pub mod engine;
pub mod error;
pub mod graph;
pub mod idc;
pub mod notify;
pub mod registry;
pub mod schedule;
pub mod stream;

// Re-export main types at crate root
pub use buffer::{Buffer, BufferDescriptor, BufferId, BufferInfo, CopyContext, CopyLimits};
pub use cache::{CacheController, CacheOp, CacheRegion, NoCache, RecordingCache};
pub use component::{
    ComponentDescriptor, ComponentDev, ComponentDriver, ComponentId, ComponentState,
    EndpointRole, Flow, StateChange, TriggerCmd,
};
pub use cpu::{CoreId, CoreSet, MAX_CORES, current_core, set_current_core};
pub use engine::{Engine, EngineConfig, Platform};
pub use error::{PipelineError, Result};
pub use graph::{PipelineDescriptor, PipelineId, PipelineInfo};
pub use idc::{CoreWorker, Idc, IdcMessage};
pub use notify::{HostNotifier, NullNotifier, RecordingNotifier, XrunNotification};
pub use registry::{DriverFactory, DriverInfo, DriverRegistry};
pub use schedule::{
    Clock, ManualScheduler, ScheduleFlags, Scheduler, TaskConfig, TaskId, TaskKind,
};
pub use stream::{Direction, SampleFormat, StreamDirection, StreamParams, StreamPosition};
