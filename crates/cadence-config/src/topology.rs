//! Topology file format.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use cadence_core::{
    ComponentDescriptor, PipelineDescriptor, SampleFormat, StreamDirection, StreamParams,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A complete audio topology: the pipelines, components, buffers and host
/// streams a host would send to the firmware.
///
/// # TOML Format
///
/// ```toml
/// name = "playback"
/// description = "host -> volume -> dai"
/// cores = 1
///
/// [[pipeline]]
/// id = 1
/// sched_comp = 3
/// source = 1
/// sink = 3
///
/// [[component]]
/// id = 2
/// kind = "volume"
/// pipeline = 1
/// [component.options]
/// gain = 50
///
/// [[buffer]]
/// id = 10
/// pipeline = 1
/// size = 768
/// from = 1
/// to = 2
///
/// [[stream]]
/// pipeline = 1
/// host = 1
/// rate = 48000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topology {
    /// Name of the topology.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Number of cores the topology needs.
    #[serde(default = "default_cores")]
    pub cores: u32,

    /// Pipelines, completed in this order.
    #[serde(default, rename = "pipeline")]
    pub pipelines: Vec<PipelineConfig>,

    /// Components.
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentConfig>,

    /// Buffers, each joining two components.
    #[serde(default, rename = "buffer")]
    pub buffers: Vec<BufferConfig>,

    /// Host streams, started in this order.
    #[serde(default, rename = "stream")]
    pub streams: Vec<StreamConfig>,
}

fn default_cores() -> u32 {
    1
}

/// One pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Pipeline ID.
    pub id: u32,
    /// Owning core.
    #[serde(default)]
    pub core: u32,
    /// Scheduling period in microseconds.
    #[serde(default = "default_period_us")]
    pub period_us: u64,
    /// Task priority.
    #[serde(default)]
    pub priority: u32,
    /// Frames moved per period.
    #[serde(default = "default_frames")]
    pub frames_per_sched: u32,
    /// Timer (true) or deadline (false) scheduling.
    #[serde(default = "default_timer_driven")]
    pub timer_driven: bool,
    /// Scheduling component. May belong to another pipeline sharing its task.
    pub sched_comp: u32,
    /// First component in data order.
    pub source: u32,
    /// Last component in data order.
    pub sink: u32,
}

fn default_period_us() -> u64 {
    1000
}

fn default_frames() -> u32 {
    48
}

fn default_timer_driven() -> bool {
    true
}

impl PipelineConfig {
    /// A 1 ms, 48 frame, timer-driven pipeline on core 0.
    pub fn new(id: u32, source: u32, sink: u32, sched_comp: u32) -> Self {
        Self {
            id,
            core: 0,
            period_us: default_period_us(),
            priority: 0,
            frames_per_sched: default_frames(),
            timer_driven: true,
            sched_comp,
            source,
            sink,
        }
    }

    /// Sets the owning core.
    pub fn with_core(mut self, core: u32) -> Self {
        self.core = core;
        self
    }

    /// Engine descriptor for this pipeline.
    pub fn descriptor(&self) -> PipelineDescriptor {
        let desc = PipelineDescriptor::new(self.id, self.sched_comp)
            .with_core(self.core)
            .with_period(self.period_us, self.frames_per_sched)
            .with_priority(self.priority);
        if self.timer_driven {
            desc
        } else {
            desc.deadline_driven()
        }
    }
}

/// Stream direction as written in topology files.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DirectionConfig {
    /// Host to port.
    #[default]
    Playback,
    /// Port to host.
    Capture,
}

impl From<DirectionConfig> for StreamDirection {
    fn from(d: DirectionConfig) -> Self {
        match d {
            DirectionConfig::Playback => StreamDirection::Playback,
            DirectionConfig::Capture => StreamDirection::Capture,
        }
    }
}

/// Sample format as written in topology files.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FormatConfig {
    /// 16-bit signed little endian.
    #[default]
    S16le,
    /// 24-bit signed in a 32-bit little endian container.
    S24le,
    /// 32-bit signed little endian.
    S32le,
    /// 32-bit float little endian.
    F32le,
}

impl From<FormatConfig> for SampleFormat {
    fn from(f: FormatConfig) -> Self {
        match f {
            FormatConfig::S16le => SampleFormat::S16Le,
            FormatConfig::S24le => SampleFormat::S24In32Le,
            FormatConfig::S32le => SampleFormat::S32Le,
            FormatConfig::F32le => SampleFormat::F32Le,
        }
    }
}

/// One component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentConfig {
    /// Component ID.
    pub id: u32,
    /// Driver type tag.
    pub kind: String,
    /// Pipeline the component is declared in.
    pub pipeline: u32,
    /// Stream direction.
    #[serde(default)]
    pub direction: DirectionConfig,
    /// Driver options.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, i64>,
}

impl ComponentConfig {
    /// A playback component of `kind` in `pipeline`.
    pub fn new(id: u32, kind: impl Into<String>, pipeline: u32) -> Self {
        Self {
            id,
            kind: kind.into(),
            pipeline,
            direction: DirectionConfig::Playback,
            options: BTreeMap::new(),
        }
    }

    /// Sets the direction.
    pub fn with_direction(mut self, direction: DirectionConfig) -> Self {
        self.direction = direction;
        self
    }

    /// Adds a driver option.
    pub fn with_option(mut self, name: impl Into<String>, value: i64) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    /// Engine descriptor for this component, placed on `core`.
    pub fn descriptor(&self, core: u32) -> ComponentDescriptor {
        let mut desc = ComponentDescriptor::new(self.id, self.kind.clone(), self.pipeline)
            .with_direction(self.direction.into())
            .with_core(core);
        desc.options.clone_from(&self.options);
        desc
    }
}

/// One buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BufferConfig {
    /// Buffer ID.
    pub id: u32,
    /// Pipeline the buffer is declared in.
    pub pipeline: u32,
    /// Capacity in bytes.
    pub size: usize,
    /// Producing component.
    pub from: u32,
    /// Consuming component.
    pub to: u32,
}

impl BufferConfig {
    /// A buffer of `size` bytes from `from` to `to`.
    pub fn new(id: u32, pipeline: u32, size: usize, from: u32, to: u32) -> Self {
        Self {
            id,
            pipeline,
            size,
            from,
            to,
        }
    }
}

/// A host stream opened on a pipeline's host endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamConfig {
    /// Pipeline the stream runs on.
    pub pipeline: u32,
    /// Host endpoint component.
    pub host: u32,
    /// Sample rate in Hz.
    #[serde(default = "default_rate")]
    pub rate: u32,
    /// Channel count.
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Sample format.
    #[serde(default)]
    pub format: FormatConfig,
}

fn default_rate() -> u32 {
    48_000
}

fn default_channels() -> u16 {
    2
}

impl StreamConfig {
    /// A 48 kHz stereo S16 stream.
    pub fn new(pipeline: u32, host: u32) -> Self {
        Self {
            pipeline,
            host,
            rate: default_rate(),
            channels: default_channels(),
            format: FormatConfig::S16le,
        }
    }

    /// Sets the sample rate.
    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Stream parameters for a stream flowing in `direction`.
    pub fn params(&self, direction: StreamDirection) -> StreamParams {
        StreamParams {
            direction,
            rate: self.rate,
            channels: self.channels,
            format: self.format.into(),
        }
    }
}

impl Topology {
    /// Creates an empty single-core topology.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            cores: 1,
            pipelines: Vec::new(),
            components: Vec::new(),
            buffers: Vec::new(),
            streams: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the number of cores.
    pub fn with_cores(mut self, cores: u32) -> Self {
        self.cores = cores;
        self
    }

    /// Adds a pipeline.
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    /// Adds a component.
    pub fn with_component(mut self, component: ComponentConfig) -> Self {
        self.components.push(component);
        self
    }

    /// Adds a buffer.
    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffers.push(buffer);
        self
    }

    /// Adds a host stream.
    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.streams.push(stream);
        self
    }

    /// Load a topology from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        content.parse()
    }

    /// Save the topology to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Convert the topology to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Component with `id`, if declared.
    pub fn component(&self, id: u32) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Pipeline with `id`, if declared.
    pub fn pipeline(&self, id: u32) -> Option<&PipelineConfig> {
        self.pipelines.iter().find(|p| p.id == id)
    }

    /// Longest scheduling period of any pipeline, in microseconds.
    pub fn max_period_us(&self) -> u64 {
        self.pipelines.iter().map(|p| p.period_us).max().unwrap_or(0)
    }
}

impl FromStr for Topology {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
