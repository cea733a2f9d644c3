//! Stream formats, directions, and position reports.

use crate::component::ComponentId;

/// Direction of an audio stream relative to the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StreamDirection {
    /// Host memory towards the physical interface.
    #[default]
    Playback,
    /// Physical interface towards host memory.
    Capture,
}

impl StreamDirection {
    /// Direction in which commands issued at the host endpoint travel.
    ///
    /// Playback commands walk downstream from the host, capture commands walk
    /// upstream from it.
    #[inline]
    pub const fn walk_direction(self) -> Direction {
        match self {
            StreamDirection::Playback => Direction::Downstream,
            StreamDirection::Capture => Direction::Upstream,
        }
    }
}

/// Direction of a graph walk along the buffer edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// From producer to consumer.
    Downstream,
    /// From consumer to producer.
    Upstream,
}

impl Direction {
    /// The opposite direction.
    #[inline]
    pub const fn reverse(self) -> Direction {
        match self {
            Direction::Downstream => Direction::Upstream,
            Direction::Upstream => Direction::Downstream,
        }
    }
}

/// PCM sample container format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 16-bit little endian.
    #[default]
    S16Le,
    /// 24-bit samples in 32-bit little endian containers.
    S24In32Le,
    /// 32-bit little endian.
    S32Le,
    /// 32-bit float little endian.
    F32Le,
}

impl SampleFormat {
    /// Bytes per sample container.
    #[inline]
    pub const fn sample_bytes(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::S24In32Le | SampleFormat::S32Le | SampleFormat::F32Le => 4,
        }
    }
}

/// PCM parameters propagated through a pipeline by `params`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamParams {
    /// Stream direction.
    pub direction: StreamDirection,
    /// Sample rate in Hz.
    pub rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample container format.
    pub format: SampleFormat,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            direction: StreamDirection::Playback,
            rate: 48_000,
            channels: 2,
            format: SampleFormat::S16Le,
        }
    }
}

impl StreamParams {
    /// Bytes per interleaved frame.
    #[inline]
    pub const fn frame_bytes(&self) -> usize {
        self.channels as usize * self.format.sample_bytes()
    }
}

/// Stream position snapshot sent to the host with timestamps and XRUN reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamPosition {
    /// Bytes moved by the host endpoint.
    pub host_posn: u64,
    /// Bytes moved by the first active DAI.
    pub dai_posn: u64,
    /// Platform wallclock at the time of the snapshot, in microseconds.
    pub wallclock_us: u64,
    /// Timestamp resolution in nanoseconds.
    pub timestamp_ns: u64,
    /// Component that reported the XRUN, if any.
    pub xrun_comp_id: Option<ComponentId>,
    /// Size of the XRUN in bytes.
    pub xrun_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_walks_downstream_capture_walks_upstream() {
        assert_eq!(
            StreamDirection::Playback.walk_direction(),
            Direction::Downstream
        );
        assert_eq!(StreamDirection::Capture.walk_direction(), Direction::Upstream);
        assert_eq!(Direction::Upstream.reverse(), Direction::Downstream);
    }

    #[test]
    fn frame_bytes_follow_format() {
        let mut params = StreamParams::default();
        assert_eq!(params.frame_bytes(), 4);
        params.format = SampleFormat::S24In32Le;
        params.channels = 6;
        assert_eq!(params.frame_bytes(), 24);
    }
}
