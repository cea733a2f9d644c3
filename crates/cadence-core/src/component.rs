//! Component devices and the driver contract.
//!
//! A component is one audio-processing stage in the graph. It is split into
//! two halves:
//!
//! - [`ComponentDev`] - the generic part owned by the engine: identity,
//!   lifecycle state, pipeline back-reference, stream parameters.
//! - [`ComponentDriver`] - the type-specific behaviour created by the
//!   [`DriverRegistry`](crate::DriverRegistry) from a
//!   [`ComponentDescriptor`].
//!
//! Driver operations receive the generic half mutably so they can drive the
//! shared state machine ([`ComponentDev::set_state`]) and adjust parameters.
//!
//! # State Machine
//!
//! ```text
//! Init → Ready → Prepare → Active ⇄ Paused
//!          ↑        ↑________/  |
//!          └── Reset / Xrun ────┘
//! ```
//!
//! A command whose target state equals the current state returns
//! [`StateChange::AlreadySet`] and leaves the state untouched.

use std::collections::BTreeMap;

use crate::buffer::{BufferId, CopyContext};
use crate::cache::CacheOp;
use crate::cpu::CoreId;
use crate::error::{PipelineError, Result};
use crate::graph::PipelineId;
use crate::stream::{Direction, StreamDirection, StreamParams, StreamPosition};

/// Unique identifier of a component, assigned by the descriptor stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub u32);

impl ComponentId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification of a component at the edge of a pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EndpointRole {
    /// Host-facing PCM endpoint.
    Host,
    /// Physical audio interface endpoint.
    Dai,
    /// Internal processing node.
    #[default]
    Node,
}

/// Lifecycle state of a component (and status of a pipeline).
///
/// Variants are ordered: anything above [`Ready`](Self::Ready) is in use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentState {
    /// Allocated; the engine moves new components to `Ready` once created.
    #[default]
    Init,
    /// Configured and idle.
    Ready,
    /// Prepared for streaming.
    Prepare,
    /// Streaming suspended, resumable with `Release`.
    Paused,
    /// Streaming.
    Active,
}

/// Commands that drive the component state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriggerCmd {
    /// Ready → Prepare.
    Prepare,
    /// Prepare → Active.
    Start,
    /// Paused → Active.
    Release,
    /// Active → Paused.
    Pause,
    /// Active/Paused → Prepare.
    Stop,
    /// Any → Ready, without validation.
    Xrun,
    /// Any → Ready. Never fails.
    Reset,
}

impl TriggerCmd {
    /// The state this command moves a component into.
    pub const fn target_state(self) -> ComponentState {
        match self {
            TriggerCmd::Start | TriggerCmd::Release => ComponentState::Active,
            TriggerCmd::Prepare | TriggerCmd::Stop => ComponentState::Prepare,
            TriggerCmd::Pause => ComponentState::Paused,
            TriggerCmd::Xrun | TriggerCmd::Reset => ComponentState::Ready,
        }
    }
}

/// Outcome of a successful state machine request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateChange {
    /// The state moved to the command's target.
    Changed,
    /// The component was already in the target state; nothing changed.
    AlreadySet,
}

impl StateChange {
    /// Maps a redundant request onto the walk-stop sentinel.
    #[inline]
    pub const fn flow(self) -> Flow {
        match self {
            StateChange::Changed => Flow::Continue,
            StateChange::AlreadySet => Flow::PathStop,
        }
    }
}

/// Non-error outcome of a component operation or graph walk step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Flow {
    /// Keep propagating along this path.
    #[default]
    Continue,
    /// Stop propagating along this path. Not a failure.
    PathStop,
}

/// Creation request for a component, as supplied by the IPC layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// Component ID.
    pub id: ComponentId,
    /// Driver type tag, looked up in the registry.
    pub kind: String,
    /// Pipeline the component is declared to belong to.
    pub pipeline_id: PipelineId,
    /// Stream direction the component serves.
    pub direction: StreamDirection,
    /// Core the component runs on.
    pub core: CoreId,
    /// Driver-specific integer options.
    pub options: BTreeMap<String, i64>,
}

impl ComponentDescriptor {
    /// Creates a playback descriptor on the primary core with no options.
    pub fn new(id: u32, kind: impl Into<String>, pipeline_id: u32) -> Self {
        Self {
            id: ComponentId(id),
            kind: kind.into(),
            pipeline_id: PipelineId(pipeline_id),
            direction: StreamDirection::Playback,
            core: CoreId::PRIMARY,
            options: BTreeMap::new(),
        }
    }

    /// Sets the stream direction.
    pub fn with_direction(mut self, direction: StreamDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the core.
    pub fn with_core(mut self, core: u32) -> Self {
        self.core = CoreId(core);
        self
    }

    /// Adds a driver option.
    pub fn with_option(mut self, name: impl Into<String>, value: i64) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    /// Looks up a driver option.
    pub fn option(&self, name: &str) -> Option<i64> {
        self.options.get(name).copied()
    }
}

/// Generic, engine-owned half of a component.
#[derive(Debug)]
pub struct ComponentDev {
    id: ComponentId,
    kind: String,
    role: EndpointRole,
    pipeline_id: PipelineId,
    core: CoreId,
    state: ComponentState,
    pub(crate) pipeline: Option<PipelineId>,
    pub(crate) frames: u32,
    /// Current stream parameters. Drivers may rewrite these in `params`.
    pub params: StreamParams,
}

impl ComponentDev {
    /// Creates the generic half from a descriptor.
    pub fn new(desc: &ComponentDescriptor, role: EndpointRole) -> Self {
        Self {
            id: desc.id,
            kind: desc.kind.clone(),
            role,
            pipeline_id: desc.pipeline_id,
            core: desc.core,
            state: ComponentState::Init,
            pipeline: None,
            frames: 0,
            params: StreamParams {
                direction: desc.direction,
                ..StreamParams::default()
            },
        }
    }

    /// Component ID.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Driver type tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Endpoint role of the component's driver.
    pub fn role(&self) -> EndpointRole {
        self.role
    }

    /// Pipeline the component was declared in.
    pub fn pipeline_id(&self) -> PipelineId {
        self.pipeline_id
    }

    /// Core the component runs on.
    pub fn core(&self) -> CoreId {
        self.core
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ComponentState {
        self.state
    }

    /// Pipeline that currently owns the component, if completed.
    pub fn pipeline(&self) -> Option<PipelineId> {
        self.pipeline
    }

    /// Frames moved per scheduling period, stamped by `complete`.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Stream direction.
    pub fn direction(&self) -> StreamDirection {
        self.params.direction
    }

    /// Bytes moved per scheduling period at the current parameters.
    pub fn period_bytes(&self) -> usize {
        self.frames as usize * self.params.frame_bytes()
    }

    /// Returns true if the component is streaming.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == ComponentState::Active
    }

    /// Applies `cmd` to the state machine.
    ///
    /// Returns [`StateChange::AlreadySet`] without touching the state when the
    /// component is already in the command's target state. Illegal transitions
    /// return [`PipelineError::InvalidState`] and leave the state unchanged.
    /// `Xrun` and `Reset` always succeed.
    pub fn set_state(&mut self, cmd: TriggerCmd) -> Result<StateChange> {
        let requested = cmd.target_state();
        if self.state == requested {
            tracing::trace!(comp = %self.id, state = ?self.state, "state already set");
            return Ok(StateChange::AlreadySet);
        }

        let valid = match cmd {
            TriggerCmd::Prepare => self.state == ComponentState::Ready,
            TriggerCmd::Start => self.state == ComponentState::Prepare,
            TriggerCmd::Release => self.state == ComponentState::Paused,
            TriggerCmd::Pause => self.state == ComponentState::Active,
            TriggerCmd::Stop => {
                matches!(self.state, ComponentState::Active | ComponentState::Paused)
            }
            TriggerCmd::Xrun => true,
            TriggerCmd::Reset => {
                if matches!(self.state, ComponentState::Active | ComponentState::Paused) {
                    tracing::warn!(comp = %self.id, state = ?self.state, "forced reset of running component");
                }
                true
            }
        };

        if !valid {
            tracing::error!(comp = %self.id, state = ?self.state, ?cmd, "invalid state transition");
            return Err(PipelineError::InvalidState {
                id: self.id,
                cmd,
                state: self.state,
            });
        }

        self.state = requested;
        Ok(StateChange::Changed)
    }
}

/// Type-specific behaviour of a component.
///
/// Every operation may return [`Flow::PathStop`] to halt propagation along the
/// current path without failing. The default implementations drive the shared
/// state machine and treat a redundant request as `PathStop`, except `reset`,
/// which always continues so a reset reaches every component.
pub trait ComponentDriver: Send {
    /// Accept (and optionally rewrite) `dev.params`.
    fn params(&mut self, dev: &mut ComponentDev) -> Result<Flow> {
        let _ = dev;
        Ok(Flow::Continue)
    }

    /// Prepare for streaming.
    fn prepare(&mut self, dev: &mut ComponentDev) -> Result<Flow> {
        dev.set_state(TriggerCmd::Prepare).map(StateChange::flow)
    }

    /// Return to `Ready`, discarding stream state.
    fn reset(&mut self, dev: &mut ComponentDev) -> Result<Flow> {
        dev.set_state(TriggerCmd::Reset)?;
        Ok(Flow::Continue)
    }

    /// Apply a trigger command.
    fn trigger(&mut self, dev: &mut ComponentDev, cmd: TriggerCmd) -> Result<Flow> {
        dev.set_state(cmd).map(StateChange::flow)
    }

    /// Move one period of audio between the component's buffers.
    fn copy(&mut self, dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow>;

    /// Maintain coherency of driver-private memory around a core handoff.
    fn cache(&mut self, dev: &ComponentDev, op: CacheOp) {
        let _ = (dev, op);
    }

    /// Report the component's stream position.
    fn position(&self, dev: &ComponentDev, posn: &mut StreamPosition) {
        let _ = (dev, posn);
    }
}

/// A component in the engine's arena: generic half, driver, buffer lists.
pub(crate) struct Component {
    pub dev: ComponentDev,
    pub driver: Box<dyn ComponentDriver>,
    /// Buffers this component consumes from, in insertion order.
    pub sources: Vec<BufferId>,
    /// Buffers this component produces into, in insertion order.
    pub sinks: Vec<BufferId>,
}

impl Component {
    /// Buffer list facing `dir`.
    pub fn buffers(&self, dir: Direction) -> &[BufferId] {
        match dir {
            Direction::Downstream => &self.sinks,
            Direction::Upstream => &self.sources,
        }
    }

    pub fn buffers_mut(&mut self, dir: Direction) -> &mut Vec<BufferId> {
        match dir {
            Direction::Downstream => &mut self.sinks,
            Direction::Upstream => &mut self.sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_in(state: ComponentState) -> ComponentDev {
        let mut dev = ComponentDev::new(&ComponentDescriptor::new(1, "test", 1), EndpointRole::Node);
        dev.state = state;
        dev
    }

    #[test]
    fn legal_transitions_follow_table() {
        let cases = [
            (TriggerCmd::Prepare, ComponentState::Ready, ComponentState::Prepare),
            (TriggerCmd::Start, ComponentState::Prepare, ComponentState::Active),
            (TriggerCmd::Release, ComponentState::Paused, ComponentState::Active),
            (TriggerCmd::Pause, ComponentState::Active, ComponentState::Paused),
            (TriggerCmd::Stop, ComponentState::Active, ComponentState::Prepare),
            (TriggerCmd::Stop, ComponentState::Paused, ComponentState::Prepare),
            (TriggerCmd::Reset, ComponentState::Active, ComponentState::Ready),
            (TriggerCmd::Reset, ComponentState::Paused, ComponentState::Ready),
            (TriggerCmd::Xrun, ComponentState::Active, ComponentState::Ready),
            (TriggerCmd::Xrun, ComponentState::Prepare, ComponentState::Ready),
        ];
        for (cmd, from, to) in cases {
            let mut dev = dev_in(from);
            assert_eq!(dev.set_state(cmd), Ok(StateChange::Changed), "{cmd:?} from {from:?}");
            assert_eq!(dev.state(), to, "{cmd:?} from {from:?}");
        }
    }

    #[test]
    fn start_from_ready_is_rejected() {
        let mut dev = dev_in(ComponentState::Ready);
        let err = dev.set_state(TriggerCmd::Start).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState { cmd: TriggerCmd::Start, .. }));
        assert_eq!(dev.state(), ComponentState::Ready);
    }

    #[test]
    fn reset_from_ready_is_already_set() {
        let mut dev = dev_in(ComponentState::Ready);
        assert_eq!(dev.set_state(TriggerCmd::Reset), Ok(StateChange::AlreadySet));
    }

    #[test]
    fn reset_from_prepare_succeeds() {
        let mut dev = dev_in(ComponentState::Prepare);
        assert_eq!(dev.set_state(TriggerCmd::Reset), Ok(StateChange::Changed));
        assert_eq!(dev.state(), ComponentState::Ready);
    }

    #[test]
    fn already_set_maps_to_path_stop() {
        assert_eq!(StateChange::AlreadySet.flow(), Flow::PathStop);
        assert_eq!(StateChange::Changed.flow(), Flow::Continue);
    }

    #[test]
    fn states_above_ready_are_ordered_busy() {
        assert!(ComponentState::Prepare > ComponentState::Ready);
        assert!(ComponentState::Paused > ComponentState::Ready);
        assert!(ComponentState::Active > ComponentState::Paused);
        assert!(ComponentState::Init < ComponentState::Ready);
    }

    #[test]
    fn descriptor_options() {
        let desc = ComponentDescriptor::new(3, "src", 1)
            .with_direction(StreamDirection::Capture)
            .with_option("out_rate", 16_000);
        assert_eq!(desc.option("out_rate"), Some(16_000));
        assert_eq!(desc.option("missing"), None);
        let dev = ComponentDev::new(&desc, EndpointRole::Node);
        assert_eq!(dev.direction(), StreamDirection::Capture);
    }
}
