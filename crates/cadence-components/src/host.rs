//! Host endpoint: the stream's interface to host memory.
//!
//! On playback the host endpoint stands in for the host DMA filling the
//! pipeline: each copy writes one period of a byte ramp into its output. On
//! capture it drains everything that reached it.
//!
//! ## Options
//!
//! | Name | Meaning | Default |
//! |------|---------|---------|
//! | `periods` | Stop supplying data after this many playback periods | unlimited |

use cadence_core::{
    ComponentDescriptor, ComponentDev, ComponentDriver, CopyContext, DriverInfo, EndpointRole,
    Flow, Result, StreamDirection, StreamPosition, TriggerCmd,
};

/// Registry entry.
pub const INFO: DriverInfo = DriverInfo {
    kind: "host",
    name: "Host",
    description: "Host memory endpoint (simulated DMA)",
    role: EndpointRole::Host,
};

/// Host endpoint driver.
#[derive(Debug, Default)]
pub struct HostDriver {
    limit: Option<u64>,
    periods: u64,
    bytes: u64,
    ramp: u8,
}

impl HostDriver {
    /// Creates a host endpoint that stops supplying playback data after
    /// `limit` periods, if given.
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Bytes transferred so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// Registry factory.
pub fn create(desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
    let limit = desc.option("periods").and_then(|p| u64::try_from(p).ok());
    Ok(Box::new(HostDriver::new(limit)))
}

impl ComponentDriver for HostDriver {
    fn reset(&mut self, dev: &mut ComponentDev) -> Result<Flow> {
        self.periods = 0;
        self.bytes = 0;
        dev.set_state(TriggerCmd::Reset)?;
        Ok(Flow::Continue)
    }

    fn copy(&mut self, dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow> {
        match dev.direction() {
            StreamDirection::Playback => {
                if self.limit.is_some_and(|limit| self.periods >= limit) {
                    tracing::trace!(comp = %dev.id(), "host data exhausted");
                    return Ok(Flow::Continue);
                }
                self.periods += 1;
                let Some(sink) = io.sink() else {
                    return Ok(Flow::Continue);
                };
                let mut left = dev.period_bytes().min(sink.free());
                let mut chunk = [0u8; 64];
                while left > 0 {
                    let n = left.min(chunk.len());
                    for b in &mut chunk[..n] {
                        *b = self.ramp;
                        self.ramp = self.ramp.wrapping_add(1);
                    }
                    left -= sink.write(&chunk[..n]);
                    self.bytes += n as u64;
                }
            }
            StreamDirection::Capture => {
                if let Some(source) = io.source() {
                    let avail = source.avail();
                    self.bytes += source.consume(avail) as u64;
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn position(&self, _dev: &ComponentDev, posn: &mut StreamPosition) {
        posn.host_posn = self.bytes;
    }
}
