//! Audio buffers: the directed edges of the component graph.
//!
//! A [`Buffer`] connects exactly one producing component (its *source*
//! endpoint) to one consuming component (its *sink* endpoint). It appears in
//! the producer's downstream list and the consumer's upstream list; both links
//! must be removed before the buffer is freed.
//!
//! The storage is a byte ring. Fill level (`avail`) drives XRUN detection and
//! preload accounting.

use crate::component::ComponentId;
use crate::error::{PipelineError, Result};
use crate::graph::PipelineId;
use crate::graph::arena::Arena;
use crate::stream::{Direction, StreamParams};

/// Unique identifier of a buffer, assigned by the descriptor stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub u32);

impl BufferId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for BufferId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Creation request for a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// Buffer ID.
    pub id: BufferId,
    /// Pipeline whose context owns the buffer.
    pub pipeline_id: PipelineId,
    /// Capacity in bytes.
    pub size: usize,
}

impl BufferDescriptor {
    /// Creates a descriptor.
    pub fn new(id: u32, pipeline_id: u32, size: usize) -> Self {
        Self {
            id: BufferId(id),
            pipeline_id: PipelineId(pipeline_id),
            size,
        }
    }
}

/// Read-only snapshot of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferInfo {
    /// Buffer ID.
    pub id: BufferId,
    /// Owning pipeline context.
    pub pipeline_id: PipelineId,
    /// Capacity in bytes.
    pub size: usize,
    /// Bytes waiting to be consumed.
    pub avail: usize,
    /// Producing component.
    pub source: Option<ComponentId>,
    /// Consuming component.
    pub sink: Option<ComponentId>,
    /// Format negotiated by `params`.
    pub params: StreamParams,
}

/// Byte ring buffer between two components.
#[derive(Debug)]
pub struct Buffer {
    id: BufferId,
    pipeline_id: PipelineId,
    data: Vec<u8>,
    read: usize,
    write: usize,
    avail: usize,
    params: StreamParams,
    pub(crate) source: Option<ComponentId>,
    pub(crate) sink: Option<ComponentId>,
}

impl Buffer {
    /// Allocates a zeroed buffer.
    ///
    /// Fails with [`PipelineError::OutOfMemory`] if the storage cannot be
    /// reserved.
    pub fn new(desc: &BufferDescriptor) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(desc.size)
            .map_err(|_| PipelineError::OutOfMemory)?;
        data.resize(desc.size, 0);
        Ok(Self {
            id: desc.id,
            pipeline_id: desc.pipeline_id,
            data,
            read: 0,
            write: 0,
            avail: 0,
            params: StreamParams::default(),
            source: None,
            sink: None,
        })
    }

    /// Snapshot of the buffer's links and fill level.
    pub fn info(&self) -> BufferInfo {
        BufferInfo {
            id: self.id,
            pipeline_id: self.pipeline_id,
            size: self.data.len(),
            avail: self.avail,
            source: self.source,
            sink: self.sink,
            params: self.params,
        }
    }

    /// Buffer ID.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Pipeline whose context owns the buffer.
    pub fn pipeline_id(&self) -> PipelineId {
        self.pipeline_id
    }

    /// Capacity in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Bytes ready to be consumed.
    pub fn avail(&self) -> usize {
        self.avail
    }

    /// Bytes that can be produced without overwriting unread data.
    pub fn free(&self) -> usize {
        self.data.len() - self.avail
    }

    /// Frame format of the data in the buffer.
    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    /// Bytes per frame of the data in the buffer.
    pub fn frame_bytes(&self) -> usize {
        self.params.frame_bytes().max(1)
    }

    /// Whole frames ready to be consumed.
    pub fn avail_frames(&self) -> usize {
        self.avail / self.frame_bytes()
    }

    /// Whole frames that can be produced.
    pub fn free_frames(&self) -> usize {
        self.free() / self.frame_bytes()
    }

    /// Producing component.
    pub fn source(&self) -> Option<ComponentId> {
        self.source
    }

    /// Consuming component.
    pub fn sink(&self) -> Option<ComponentId> {
        self.sink
    }

    /// Component at the far end when walking in `dir`.
    pub fn endpoint(&self, dir: Direction) -> Option<ComponentId> {
        match dir {
            Direction::Downstream => self.sink,
            Direction::Upstream => self.source,
        }
    }

    pub(crate) fn set_endpoint(&mut self, dir: Direction, comp: Option<ComponentId>) {
        match dir {
            Direction::Downstream => self.sink = comp,
            Direction::Upstream => self.source = comp,
        }
    }

    /// Returns true if neither endpoint is linked.
    pub fn is_detached(&self) -> bool {
        self.source.is_none() && self.sink.is_none()
    }

    /// Adopts the frame format carried by a `params` walk.
    pub fn set_params(&mut self, params: &StreamParams) {
        self.params = *params;
    }

    /// Discards all content and rewinds both positions.
    pub fn reset_pos(&mut self) {
        self.read = 0;
        self.write = 0;
        self.avail = 0;
        self.data.fill(0);
    }

    /// Appends up to `src.len()` bytes. Returns the number written.
    pub fn write(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.free());
        let mut done = 0;
        while done < n {
            let chunk = (n - done).min(self.data.len() - self.write);
            self.data[self.write..self.write + chunk].copy_from_slice(&src[done..done + chunk]);
            self.write = (self.write + chunk) % self.data.len();
            done += chunk;
        }
        self.avail += n;
        n
    }

    /// Appends up to `bytes` zero bytes. Returns the number written.
    pub fn write_silence(&mut self, bytes: usize) -> usize {
        let n = bytes.min(self.free());
        let mut done = 0;
        while done < n {
            let chunk = (n - done).min(self.data.len() - self.write);
            self.data[self.write..self.write + chunk].fill(0);
            self.write = (self.write + chunk) % self.data.len();
            done += chunk;
        }
        self.avail += n;
        n
    }

    /// Removes up to `dst.len()` bytes into `dst`. Returns the number read.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.avail);
        let mut done = 0;
        while done < n {
            let chunk = (n - done).min(self.data.len() - self.read);
            dst[done..done + chunk].copy_from_slice(&self.data[self.read..self.read + chunk]);
            self.read = (self.read + chunk) % self.data.len();
            done += chunk;
        }
        self.avail -= n;
        n
    }

    /// Drops up to `bytes` bytes without reading them. Returns the number dropped.
    pub fn consume(&mut self, bytes: usize) -> usize {
        let n = bytes.min(self.avail);
        if n > 0 {
            self.read = (self.read + n) % self.data.len();
            self.avail -= n;
        }
        n
    }

    /// Moves up to `bytes` bytes from this buffer into `sink`.
    pub fn copy_to(&mut self, sink: &mut Buffer, bytes: usize) -> usize {
        let n = bytes.min(self.avail).min(sink.free());
        let mut done = 0;
        while done < n {
            let chunk = (n - done)
                .min(self.data.len() - self.read)
                .min(sink.data.len() - sink.write);
            sink.data[sink.write..sink.write + chunk]
                .copy_from_slice(&self.data[self.read..self.read + chunk]);
            self.read = (self.read + chunk) % self.data.len();
            sink.write = (sink.write + chunk) % sink.data.len();
            done += chunk;
        }
        self.avail -= n;
        sink.avail += n;
        n
    }
}

/// Frame count and byte sizes for one copy between the primary buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyLimits {
    /// Primary source buffer.
    pub source: BufferId,
    /// Primary sink buffer.
    pub sink: BufferId,
    /// Frames that can move: the smaller of source data and sink space.
    pub frames: usize,
    /// Bytes per frame in the source buffer.
    pub source_frame_bytes: usize,
    /// Bytes per frame in the sink buffer.
    pub sink_frame_bytes: usize,
    /// `frames` in source bytes.
    pub source_bytes: usize,
    /// `frames` in sink bytes.
    pub sink_bytes: usize,
}

/// Buffer access handed to [`ComponentDriver::copy`](crate::ComponentDriver::copy).
///
/// Exposes the component's source and sink buffers (in insertion order; the
/// first of each is the primary copy pair) and lets the driver report an
/// underrun or overrun.
pub struct CopyContext<'a> {
    sources: &'a [BufferId],
    sinks: &'a [BufferId],
    buffers: &'a mut Arena<Buffer>,
    xrun: Option<u32>,
}

impl<'a> CopyContext<'a> {
    pub(crate) fn new(
        sources: &'a [BufferId],
        sinks: &'a [BufferId],
        buffers: &'a mut Arena<Buffer>,
    ) -> Self {
        Self {
            sources,
            sinks,
            buffers,
            xrun: None,
        }
    }

    /// Buffers the component consumes from.
    pub fn sources(&self) -> &[BufferId] {
        self.sources
    }

    /// Buffers the component produces into.
    pub fn sinks(&self) -> &[BufferId] {
        self.sinks
    }

    /// Mutable access to one of the component's buffers.
    pub fn buffer(&mut self, id: BufferId) -> Option<&mut Buffer> {
        if !self.sources.contains(&id) && !self.sinks.contains(&id) {
            return None;
        }
        self.buffers.get_mut(id.0)
    }

    /// The primary source buffer.
    pub fn source(&mut self) -> Option<&mut Buffer> {
        let id = *self.sources.first()?;
        self.buffers.get_mut(id.0)
    }

    /// The primary sink buffer.
    pub fn sink(&mut self) -> Option<&mut Buffer> {
        let id = *self.sinks.first()?;
        self.buffers.get_mut(id.0)
    }

    /// Mutable access to a source and a sink buffer at once.
    pub fn pair(&mut self, source: BufferId, sink: BufferId) -> Option<(&mut Buffer, &mut Buffer)> {
        if !self.sources.contains(&source) || !self.sinks.contains(&sink) {
            return None;
        }
        self.buffers.pair_mut(source.0, sink.0)
    }

    /// Copy limits of the primary source/sink pair.
    pub fn limits(&self) -> Option<CopyLimits> {
        let source_id = *self.sources.first()?;
        let sink_id = *self.sinks.first()?;
        let source = self.buffers.get(source_id.0)?;
        let sink = self.buffers.get(sink_id.0)?;
        let frames = source.avail_frames().min(sink.free_frames());
        let source_frame_bytes = source.frame_bytes();
        let sink_frame_bytes = sink.frame_bytes();
        Some(CopyLimits {
            source: source_id,
            sink: sink_id,
            frames,
            source_frame_bytes,
            sink_frame_bytes,
            source_bytes: frames * source_frame_bytes,
            sink_bytes: frames * sink_frame_bytes,
        })
    }

    /// Moves up to `bytes` from the primary source into the primary sink.
    pub fn transfer(&mut self, bytes: usize) -> usize {
        let (Some(&source), Some(&sink)) = (self.sources.first(), self.sinks.first()) else {
            return 0;
        };
        match self.buffers.pair_mut(source.0, sink.0) {
            Some((src, dst)) => src.copy_to(dst, bytes),
            None => 0,
        }
    }

    /// Reports an underrun (playback) or overrun (capture) of `bytes`.
    ///
    /// The engine raises the pipeline XRUN once the driver's `copy` returns.
    pub fn report_xrun(&mut self, bytes: u32) {
        self.xrun = Some(self.xrun.unwrap_or(0).max(bytes));
    }

    pub(crate) fn take_xrun(&mut self) -> Option<u32> {
        self.xrun.take()
    }
}
