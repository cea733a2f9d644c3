//! Notifications sent to the host.

use parking_lot::Mutex;

use crate::component::ComponentId;
use crate::graph::PipelineId;
use crate::stream::StreamPosition;

/// XRUN report delivered to the host for one host endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XrunNotification {
    /// Pipeline that entered XRUN.
    pub pipeline: PipelineId,
    /// Host endpoint the report is addressed to.
    pub host: ComponentId,
    /// Position snapshot, with `xrun_comp_id` and `xrun_size` filled in.
    pub posn: StreamPosition,
}

/// Host-facing notification channel.
pub trait HostNotifier: Send + Sync {
    /// Delivers an XRUN report.
    fn xrun(&self, notification: XrunNotification);
}

/// Notifier that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

impl HostNotifier for NullNotifier {
    fn xrun(&self, _notification: XrunNotification) {}
}

/// Notifier that keeps every report for later inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    xruns: Mutex<Vec<XrunNotification>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// XRUN reports received so far.
    pub fn xruns(&self) -> Vec<XrunNotification> {
        self.xruns.lock().clone()
    }

    /// Number of XRUN reports received.
    pub fn xrun_count(&self) -> usize {
        self.xruns.lock().len()
    }
}

impl HostNotifier for RecordingNotifier {
    fn xrun(&self, notification: XrunNotification) {
        self.xruns.lock().push(notification);
    }
}
