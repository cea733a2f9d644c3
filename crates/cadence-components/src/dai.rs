//! DAI endpoint: the stream's interface to the physical audio port.
//!
//! The simulated port consumes (playback) or produces (capture) exactly one
//! period per copy. A period it cannot move in full is an XRUN, reported to
//! the engine with the missing byte count.
//!
//! On playback the first copy after `prepare` only primes the port, so the
//! period written during preload is what the next copy plays.

use cadence_core::{
    ComponentDescriptor, ComponentDev, ComponentDriver, CopyContext, DriverInfo, EndpointRole,
    Flow, Result, StateChange, StreamDirection, StreamPosition, TriggerCmd,
};

/// Registry entry.
pub const INFO: DriverInfo = DriverInfo {
    kind: "dai",
    name: "DAI",
    description: "Digital audio interface endpoint (simulated port)",
    role: EndpointRole::Dai,
};

/// DAI endpoint driver.
#[derive(Debug, Default)]
pub struct DaiDriver {
    primed: bool,
    bytes: u64,
    xruns: u64,
}

impl DaiDriver {
    /// Creates an idle port.
    pub fn new() -> Self {
        Self::default()
    }

    /// XRUNs this port has detected.
    pub fn xruns(&self) -> u64 {
        self.xruns
    }
}

/// Registry factory.
pub fn create(_desc: &ComponentDescriptor) -> Result<Box<dyn ComponentDriver>> {
    Ok(Box::new(DaiDriver::new()))
}

impl ComponentDriver for DaiDriver {
    fn prepare(&mut self, dev: &mut ComponentDev) -> Result<Flow> {
        self.primed = false;
        dev.set_state(TriggerCmd::Prepare).map(StateChange::flow)
    }

    fn reset(&mut self, dev: &mut ComponentDev) -> Result<Flow> {
        self.primed = false;
        self.bytes = 0;
        dev.set_state(TriggerCmd::Reset)?;
        Ok(Flow::Continue)
    }

    fn copy(&mut self, dev: &mut ComponentDev, io: &mut CopyContext<'_>) -> Result<Flow> {
        let period = dev.period_bytes();
        let missing = match dev.direction() {
            StreamDirection::Playback => {
                if !self.primed {
                    self.primed = true;
                    return Ok(Flow::Continue);
                }
                let Some(source) = io.source() else {
                    return Ok(Flow::Continue);
                };
                let moved = source.consume(period);
                self.bytes += moved as u64;
                period - moved
            }
            StreamDirection::Capture => {
                let Some(sink) = io.sink() else {
                    return Ok(Flow::Continue);
                };
                let moved = sink.write_silence(period);
                self.bytes += moved as u64;
                period - moved
            }
        };

        if missing > 0 {
            self.xruns += 1;
            tracing::debug!(comp = %dev.id(), missing, direction = ?dev.direction(), "port xrun");
            io.report_xrun(xrun_bytes(missing));
        }
        Ok(Flow::Continue)
    }

    fn position(&self, _dev: &ComponentDev, posn: &mut StreamPosition) {
        posn.dai_posn = self.bytes;
    }
}

/// Shortfall in the width the XRUN report carries, saturating.
fn xrun_bytes(missing: usize) -> u32 {
    u32::try_from(missing).unwrap_or(u32::MAX)
}
