//! Mixer node: sums every source into one sink.
//!
//! A mixer is shared by several upstream streams. It starts with the first of
//! them and keeps running until the last one stops, so a command that only
//! changes the number of attached streams stops the walk at the mixer
//! instead of reaching the shared downstream path.

use cadence_core::{
    ComponentDescriptor, ComponentDev, ComponentDriver, CopyContext, DriverInfo, EndpointRole,
    Flow, PipelineError, Result, StateChange, TriggerCmd,
};

use crate::pcm;

/// Registry entry.
pub const INFO: DriverInfo = DriverInfo {
    kind: "mixer",
    name: "Mixer",
    description: "Saturating sum of all sources into one sink",
    role: EndpointRole::Node,
};

/// Mixer driver.
#[derive(Debug, Default)]
pub struct MixerDriver {
    streams: u32,
    acc: Vec<u8>,
    scratch: Vec<u8>,
}

impl MixerDriver {
    /// Creates an idle mixer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams currently running through the mixer.
    pub fn streams(&self) -> u32 {
        self.streams
    }
}

/// Registry factory.
pub fn create(_desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
    Ok(Box::new(MixerDriver::new()))
}

impl ComponentDriver for MixerDriver {
    fn prepare(&mut self, dev: &mut ComponentDev) -> Result<Flow> {
        if dev.is_active() {
            return Ok(Flow::PathStop);
        }
        dev.set_state(TriggerCmd::Prepare).map(StateChange::flow)
    }

    fn reset(&mut self, dev: &mut ComponentDev) -> Result<Flow> {
        self.streams = 0;
        dev.set_state(TriggerCmd::Reset)?;
        Ok(Flow::Continue)
    }

    fn trigger(&mut self, dev: &mut ComponentDev, cmd: TriggerCmd) -> Result<Flow> {
        match cmd {
            TriggerCmd::Start | TriggerCmd::Release if dev.is_active() => {
                self.streams += 1;
                tracing::debug!(comp = %dev.id(), streams = self.streams, "stream joined mixer");
                Ok(Flow::PathStop)
            }
            TriggerCmd::Pause | TriggerCmd::Stop if self.streams > 1 => {
                self.streams -= 1;
                tracing::debug!(comp = %dev.id(), streams = self.streams, "stream left mixer");
                Ok(Flow::PathStop)
            }
            _ => {
                let change = dev.set_state(cmd)?;
                self.streams = match cmd {
                    TriggerCmd::Start | TriggerCmd::Release => 1,
                    _ => 0,
                };
                Ok(change.flow())
            }
        }
    }

    fn copy(&mut self, dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow> {
        let Some(&sink_id) = io.sinks().first() else {
            return Ok(Flow::Continue);
        };
        let sources: Vec<_> = io.sources().to_vec();

        let mut bytes = io.buffer(sink_id).map_or(0, |b| b.free());
        let mut live = Vec::with_capacity(sources.len());
        for id in sources {
            let avail = io.buffer(id).map_or(0, |b| b.avail());
            if avail > 0 {
                bytes = bytes.min(avail);
                live.push(id);
            }
        }
        let frame = dev.params.frame_bytes().max(1);
        bytes -= bytes % frame;
        if live.is_empty() || bytes == 0 {
            return Ok(Flow::Continue);
        }

        if !pcm::ensure_len(&mut self.acc, bytes) || !pcm::ensure_len(&mut self.scratch, bytes) {
            return Err(PipelineError::OutOfMemory);
        }
        let format = dev.params.format;
        let acc = &mut self.acc[..bytes];
        let scratch = &mut self.scratch[..bytes];
        acc.fill(0);
        for id in live {
            if let Some(source) = io.buffer(id) {
                let read = source.read(scratch);
                pcm::mix_into(format, &mut acc[..read], &scratch[..read]);
            }
        }
        if let Some(sink) = io.buffer(sink_id) {
            sink.write(acc);
        }
        Ok(Flow::Continue)
    }
}
