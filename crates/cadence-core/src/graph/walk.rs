//! Directional graph walk and pipeline boundary checks.

use crate::buffer::Buffer;
use crate::component::{ComponentId, EndpointRole, Flow};
use crate::error::Result;
use crate::stream::{Direction, StreamDirection};

use super::{Graph, PipelineId};

/// Per-component step of a walk. Recurses by calling
/// [`Graph::for_each_comp`] on its own buffer list.
pub(crate) type Visitor<C> = fn(&mut Graph, &mut C, ComponentId, Direction) -> Result<Flow>;

/// Side effect applied to every buffer a walk crosses, before its far end is
/// visited.
pub(crate) type BufferOp<C> = fn(&mut Buffer, &C);

impl Graph {
    /// Visits the far end of every buffer on the `dir` side of `current`.
    ///
    /// For each buffer in list order: apply `buffer_op`, resolve the far-end
    /// component, skip the buffer if nothing is attached there, otherwise call
    /// `visit`. An error stops the loop and is returned; `PathStop` only ends
    /// that branch. Returns the result of the last visit.
    pub fn for_each_comp<C>(
        &mut self,
        current: ComponentId,
        dir: Direction,
        ctx: &mut C,
        visit: Visitor<C>,
        buffer_op: Option<BufferOp<C>>,
    ) -> Result<Flow> {
        let mut flow = Flow::Continue;
        let mut idx = 0;

        loop {
            let Some(buf_id) = self
                .comps
                .get(current.0)
                .and_then(|c| c.buffers(dir).get(idx).copied())
            else {
                break;
            };
            idx += 1;

            let Some(buffer) = self.buffers.get_mut(buf_id.0) else {
                continue;
            };
            if let Some(op) = buffer_op {
                op(buffer, ctx);
            }

            let Some(next) = buffer.endpoint(dir) else {
                tracing::trace!(comp = %current, buffer = %buf_id, "unconnected buffer");
                continue;
            };
            if !self.comps.contains(next.0) {
                continue;
            }

            flow = visit(self, ctx, next, dir)?;
        }

        Ok(flow)
    }

    /// Returns true if `current` was declared in the same pipeline as `start`.
    pub fn is_single_pipeline(&self, current: ComponentId, start: ComponentId) -> bool {
        match (self.comps.get(current.0), self.comps.get(start.0)) {
            (Some(a), Some(b)) => a.dev.pipeline_id() == b.dev.pipeline_id(),
            _ => false,
        }
    }

    /// Returns true if both pipelines exist and share a scheduling component.
    pub fn is_same_sched(&self, a: Option<PipelineId>, b: Option<PipelineId>) -> bool {
        let sched = |p: Option<PipelineId>| {
            p.and_then(|id| self.pipelines.get(id.0))
                .map(|p| p.desc.sched_comp)
        };
        match (sched(a), sched(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Returns true if a `direction` stream must not propagate into the
    /// pipeline that owns `current`.
    ///
    /// Playback stops at pipelines whose sink is a host or internal node,
    /// capture at pipelines whose sink is a DAI or internal node. Components
    /// that no pipeline has stamped yet also stop propagation.
    pub fn crossing_blocked(&self, current: ComponentId, direction: StreamDirection) -> bool {
        let role = self
            .comps
            .get(current.0)
            .and_then(|c| c.dev.pipeline())
            .and_then(|p| self.pipelines.get(p.0))
            .and_then(|p| p.sink)
            .and_then(|sink| self.comps.get(sink.0))
            .map(|c| c.dev.role());

        let Some(role) = role else {
            tracing::trace!(comp = %current, "neighbour pipeline not completed");
            return true;
        };
        match direction {
            StreamDirection::Playback => matches!(role, EndpointRole::Host | EndpointRole::Node),
            StreamDirection::Capture => matches!(role, EndpointRole::Dai | EndpointRole::Node),
        }
    }

    /// The component attached to the first buffer on the `dir` side of `comp`.
    pub fn previous(&self, comp: ComponentId, dir: Direction) -> Option<ComponentId> {
        let buf = *self.comps.get(comp.0)?.buffers(dir).first()?;
        self.buffers.get(buf.0)?.endpoint(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::error::PipelineError;
    use crate::buffer::{BufferDescriptor, BufferId};

    #[derive(Default)]
    struct Trail {
        visited: Vec<ComponentId>,
        stop_at: Option<ComponentId>,
        fail_at: Option<ComponentId>,
    }

    fn record(g: &mut Graph, t: &mut Trail, current: ComponentId, dir: Direction) -> Result<Flow> {
        if t.fail_at == Some(current) {
            return Err(PipelineError::component(current, "boom"));
        }
        t.visited.push(current);
        if t.stop_at == Some(current) {
            return Ok(Flow::PathStop);
        }
        g.for_each_comp(current, dir, t, record, Some(note_buffer))
    }

    fn note_buffer(buf: &mut Buffer, _t: &Trail) {
        buf.write(&[1]);
    }

    fn tree(g: &mut Graph) -> [ComponentId; 4] {
        // 1 -> 2 -> 3
        //      2 -> 4
        let a = add_comp(g, 1, 1, EndpointRole::Host, StreamDirection::Playback);
        let b = add_comp(g, 2, 1, EndpointRole::Node, StreamDirection::Playback);
        let c = add_comp(g, 3, 1, EndpointRole::Dai, StreamDirection::Playback);
        let d = add_comp(g, 4, 1, EndpointRole::Dai, StreamDirection::Playback);
        link(g, 10, 1, a, b);
        link(g, 11, 1, b, c);
        link(g, 12, 1, b, d);
        [a, b, c, d]
    }

    #[test]
    fn walks_tree_in_list_order() {
        let (mut g, _) = graph();
        let [a, b, c, d] = tree(&mut g);
        let mut trail = Trail::default();
        g.for_each_comp(a, Direction::Downstream, &mut trail, record, Some(note_buffer))
            .unwrap();
        assert_eq!(trail.visited, vec![b, c, d]);
        for id in [10, 11, 12] {
            assert_eq!(g.buffer(BufferId(id)).unwrap().avail(), 1);
        }
    }

    #[test]
    fn upstream_walk_reverses_edges() {
        let (mut g, _) = graph();
        let [a, b, c, _] = tree(&mut g);
        let mut trail = Trail::default();
        g.for_each_comp(c, Direction::Upstream, &mut trail, record, None)
            .unwrap();
        assert_eq!(trail.visited, vec![b, a]);
    }

    #[test]
    fn path_stop_ends_only_that_branch() {
        let (mut g, _) = graph();
        let [a, b, c, d] = tree(&mut g);
        let e = add_comp(&mut g, 5, 1, EndpointRole::Node, StreamDirection::Playback);
        link(&mut g, 13, 1, c, e);
        let mut trail = Trail {
            stop_at: Some(c),
            ..Trail::default()
        };
        g.for_each_comp(a, Direction::Downstream, &mut trail, record, None)
            .unwrap();
        assert_eq!(trail.visited, vec![b, c, d]);
    }

    #[test]
    fn error_stops_the_loop() {
        let (mut g, _) = graph();
        let [a, _, c, d] = tree(&mut g);
        let mut trail = Trail {
            fail_at: Some(c),
            ..Trail::default()
        };
        let err = g
            .for_each_comp(a, Direction::Downstream, &mut trail, record, None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Component { .. }));
        assert!(!trail.visited.contains(&d));
    }

    #[test]
    fn dangling_buffer_is_skipped() {
        let (mut g, _) = graph();
        let [a, b, c, d] = tree(&mut g);
        let open = Buffer::new(&BufferDescriptor::new(20, 1, 64)).unwrap();
        g.add_buffer(open).unwrap();
        g.connect(b, BufferId(20), Direction::Downstream).unwrap();

        let mut trail = Trail::default();
        let flow = g
            .for_each_comp(a, Direction::Downstream, &mut trail, record, Some(note_buffer))
            .unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(trail.visited, vec![b, c, d]);
        // The buffer side effect still runs on the unconnected buffer.
        assert_eq!(g.buffer(BufferId(20)).unwrap().avail(), 1);
    }

    #[test]
    fn single_pipeline_compares_declared_ids() {
        let (mut g, _) = graph();
        let a = add_comp(&mut g, 1, 1, EndpointRole::Host, StreamDirection::Playback);
        let b = add_comp(&mut g, 2, 2, EndpointRole::Node, StreamDirection::Playback);
        let c = add_comp(&mut g, 3, 1, EndpointRole::Dai, StreamDirection::Playback);
        assert!(!g.is_single_pipeline(b, a));
        assert!(g.is_single_pipeline(c, a));
    }

    #[test]
    fn unstamped_neighbour_blocks_crossing() {
        let (mut g, _) = graph();
        let a = add_comp(&mut g, 1, 2, EndpointRole::Node, StreamDirection::Playback);
        assert!(g.crossing_blocked(a, StreamDirection::Playback));
        assert!(g.crossing_blocked(a, StreamDirection::Capture));
    }

    #[test]
    fn previous_follows_first_buffer() {
        let (mut g, _) = graph();
        let [a, b, c, _] = tree(&mut g);
        assert_eq!(g.previous(c, Direction::Upstream), Some(b));
        assert_eq!(g.previous(b, Direction::Upstream), Some(a));
        assert_eq!(g.previous(a, Direction::Upstream), None);
    }
}
