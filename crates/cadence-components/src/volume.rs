//! Fixed-gain volume node.

use cadence_core::{
    ComponentDescriptor, ComponentDev, ComponentDriver, CopyContext, DriverInfo, EndpointRole,
    Flow, PipelineError, Result,
};

use crate::pcm;

/// Registry entry.
pub const INFO: DriverInfo = DriverInfo {
    kind: "volume",
    name: "Volume",
    description: "Fixed gain in percent (option `gain`, 0 to 10000, default 100)",
    role: EndpointRole::Node,
};

/// Gain applied when the descriptor carries no `gain` option.
pub const DEFAULT_GAIN_PCT: i64 = 100;

/// Largest accepted gain, +40 dB.
pub const MAX_GAIN_PCT: i64 = 10_000;

/// Scales samples from its source into its sink.
#[derive(Debug)]
pub struct VolumeDriver {
    gain_pct: i64,
    scratch: Vec<u8>,
}

impl VolumeDriver {
    /// Creates a volume node with `gain_pct` percent gain.
    pub fn new(gain_pct: i64) -> Self {
        Self {
            gain_pct,
            scratch: Vec::new(),
        }
    }

    /// Current gain in percent.
    pub fn gain_pct(&self) -> i64 {
        self.gain_pct
    }
}

/// Registry factory. Rejects gains outside `0..=MAX_GAIN_PCT`.
pub fn create(desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
    let gain = desc.option("gain").unwrap_or(DEFAULT_GAIN_PCT);
    if !(0..=MAX_GAIN_PCT).contains(&gain) {
        return Err(PipelineError::component(
            desc.id,
            format!("gain {gain}% outside 0..={MAX_GAIN_PCT}"),
        ));
    }
    Ok(Box::new(VolumeDriver::new(gain)))
}

impl ComponentDriver for VolumeDriver {
    fn copy(&mut self, dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow> {
        let Some(limits) = io.limits() else {
            return Ok(Flow::Continue);
        };
        let bytes = limits.source_bytes.min(limits.sink_bytes);
        if bytes == 0 {
            return Ok(Flow::Continue);
        }
        if !pcm::ensure_len(&mut self.scratch, bytes) {
            return Err(PipelineError::OutOfMemory);
        }
        let Some((source, sink)) = io.pair(limits.source, limits.sink) else {
            return Ok(Flow::Continue);
        };

        let data = &mut self.scratch[..bytes];
        let read = source.read(data);
        pcm::scale(dev.params.format, &mut data[..read], self.gain_pct);
        sink.write(&data[..read]);
        Ok(Flow::Continue)
    }
}
