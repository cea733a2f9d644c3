//! Sample rate converter node.
//!
//! Converts between the rates of its source and sink buffers by zero-order
//! hold: every output frame repeats the most recent input frame. During
//! `params` the node rewrites the stream rate to `rate`, so every component
//! past it (in walk order, away from the host) is configured for the
//! converted rate.
//!
//! ## Options
//!
//! | Name | Meaning | Default |
//! |------|---------|---------|
//! | `rate` | Rate on the side away from the host, in Hz | required |

use cadence_core::{
    ComponentDescriptor, ComponentDev, ComponentDriver, CopyContext, DriverInfo, EndpointRole,
    Flow, PipelineError, Result, StateChange, TriggerCmd,
};

use crate::pcm;

/// Registry entry.
pub const INFO: DriverInfo = DriverInfo {
    kind: "src",
    name: "Sample rate converter",
    description: "Zero-order-hold rate conversion (option `rate`)",
    role: EndpointRole::Node,
};

/// Rate converter driver.
#[derive(Debug)]
pub struct SrcDriver {
    rate: u32,
    phase: u64,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl SrcDriver {
    /// Creates a converter whose far side runs at `rate` Hz.
    pub fn new(rate: u32) -> Self {
        Self {
            rate,
            phase: 0,
            input: Vec::new(),
            output: Vec::new(),
        }
    }
}

/// Registry factory. The `rate` option must be a positive rate.
pub fn create(desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
    let rate = desc
        .option("rate")
        .and_then(|r| u32::try_from(r).ok())
        .filter(|r| *r > 0)
        .ok_or_else(|| PipelineError::component(desc.id, "src needs a positive `rate` option"))?;
    Ok(Box::new(SrcDriver::new(rate)))
}

/// Number of input frames (at most `avail`) whose output fits in `space`
/// frames, and the output frame count they produce.
fn plan(mut phase: u64, in_rate: u64, out_rate: u64, avail: usize, space: usize) -> (usize, usize) {
    let mut consumed = 0;
    let mut produced = 0;
    while consumed < avail {
        let emit = ((phase + out_rate) / in_rate) as usize;
        if produced + emit > space {
            break;
        }
        phase = (phase + out_rate) % in_rate;
        produced += emit;
        consumed += 1;
    }
    (consumed, produced)
}

impl ComponentDriver for SrcDriver {
    fn params(&mut self, dev: &mut ComponentDev) -> Result<Flow> {
        tracing::debug!(comp = %dev.id(), from = dev.params.rate, to = self.rate, "rate conversion");
        dev.params.rate = self.rate;
        Ok(Flow::Continue)
    }

    fn prepare(&mut self, dev: &mut ComponentDev) -> Result<Flow> {
        self.phase = 0;
        dev.set_state(TriggerCmd::Prepare).map(StateChange::flow)
    }

    fn copy(&mut self, dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow> {
        let (Some(&source_id), Some(&sink_id)) = (io.sources().first(), io.sinks().first()) else {
            return Ok(Flow::Continue);
        };
        let Some((source, sink)) = io.pair(source_id, sink_id) else {
            return Ok(Flow::Continue);
        };

        let frame = source.frame_bytes();
        if frame != sink.frame_bytes() || frame == 0 {
            return Err(PipelineError::component(dev.id(), "source and sink frame sizes differ"));
        }
        let in_rate = u64::from(source.params().rate.max(1));
        let out_rate = u64::from(sink.params().rate.max(1));
        let (consumed, produced) =
            plan(self.phase, in_rate, out_rate, source.avail_frames(), sink.free_frames());
        if consumed == 0 {
            return Ok(Flow::Continue);
        }

        if !pcm::ensure_len(&mut self.input, consumed * frame)
            || !pcm::ensure_len(&mut self.output, produced * frame)
        {
            return Err(PipelineError::OutOfMemory);
        }
        let input = &mut self.input[..consumed * frame];
        let output = &mut self.output[..produced * frame];
        source.read(input);

        let mut out = 0;
        for frame_in in input.chunks_exact(frame) {
            self.phase += out_rate;
            while self.phase >= in_rate {
                self.phase -= in_rate;
                output[out..out + frame].copy_from_slice(frame_in);
                out += frame;
            }
        }
        sink.write(output);
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_upsamples() {
        // 1 -> 2: every input frame yields two outputs
        assert_eq!(plan(0, 1, 2, 4, 100), (4, 8));
        // space for three outputs only admits one input frame
        assert_eq!(plan(0, 1, 2, 4, 3), (1, 2));
    }

    #[test]
    fn plan_downsamples() {
        assert_eq!(plan(0, 2, 1, 4, 100), (4, 2));
        assert_eq!(plan(1, 2, 1, 1, 100), (1, 1));
    }

    #[test]
    fn plan_keeps_long_run_ratio() {
        let (consumed, produced) = plan(0, 44_100, 48_000, 44_100, usize::MAX);
        assert_eq!((consumed, produced), (44_100, 48_000));
    }

    #[test]
    fn missing_rate_is_rejected() {
        assert!(create(&ComponentDescriptor::new(5, "src", 1)).is_err());
        assert!(create(&ComponentDescriptor::new(5, "src", 1).with_option("rate", 0)).is_err());
        assert!(create(&ComponentDescriptor::new(5, "src", 1).with_option("rate", 48_000)).is_ok());
    }
}
