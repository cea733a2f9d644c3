//! Inter-core communication.
//!
//! Every secondary core is served by a [`CoreWorker`]: a thread bound to that
//! core which executes messages from other cores. [`Idc::send`] blocks until
//! the target core has executed the message and replied with its result.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::component::{ComponentId, TriggerCmd};
use crate::cpu::{CoreId, set_current_core};
use crate::engine::Engine;
use crate::error::{PipelineError, Result};
use crate::graph::PipelineId;

/// Request executed on another core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdcMessage {
    /// Run a trigger on the core that owns the pipeline.
    Trigger {
        /// Pipeline to trigger.
        pipeline: PipelineId,
        /// Component the trigger enters at.
        host: ComponentId,
        /// Command to apply.
        cmd: TriggerCmd,
    },
}

enum Envelope {
    Message {
        msg: IdcMessage,
        reply: Sender<Result<()>>,
    },
    Shutdown,
}

/// Per-core mailboxes.
#[derive(Default)]
pub struct Idc {
    mailboxes: Mutex<BTreeMap<CoreId, Sender<Envelope>>>,
}

impl Idc {
    /// Creates an empty set of mailboxes.
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, core: CoreId, tx: Sender<Envelope>) {
        self.mailboxes.lock().insert(core, tx);
    }

    fn unregister(&self, core: CoreId) {
        self.mailboxes.lock().remove(&core);
    }

    /// Returns true if a worker is serving `core`.
    pub fn is_served(&self, core: CoreId) -> bool {
        self.mailboxes.lock().contains_key(&core)
    }

    /// Sends `msg` to `core` and waits for the result.
    pub fn send(&self, core: CoreId, msg: IdcMessage) -> Result<()> {
        let Some(tx) = self.mailboxes.lock().get(&core).cloned() else {
            tracing::error!(%core, ?msg, "no worker serving core");
            return Err(PipelineError::InvalidCore(core));
        };

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        tx.send(Envelope::Message { msg, reply: reply_tx })
            .map_err(|e| channel_error(core, &e))?;
        reply_rx.recv().map_err(|e| channel_error(core, &e))?
    }
}

fn channel_error(core: CoreId, err: &dyn core::fmt::Display) -> PipelineError {
    tracing::error!(%core, error = %err, "idc channel failure");
    PipelineError::ChannelError(format!("core {core}: {err}"))
}

impl core::fmt::Debug for Idc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let cores: Vec<CoreId> = self.mailboxes.lock().keys().copied().collect();
        f.debug_struct("Idc").field("served", &cores).finish()
    }
}

/// Thread executing one secondary core.
///
/// The core is enabled while the worker runs and disabled again when it is
/// stopped or dropped.
#[derive(Debug)]
pub struct CoreWorker {
    core: CoreId,
    engine: Arc<Engine>,
    tx: Sender<Envelope>,
    handle: Option<JoinHandle<()>>,
}

impl CoreWorker {
    /// Starts serving `core`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidCore`] for the primary core, a core outside the
    /// engine configuration, or a core that already has a worker;
    /// [`PipelineError::ChannelError`] if the thread cannot be spawned.
    pub fn spawn(engine: Arc<Engine>, core: CoreId) -> Result<Self> {
        if core == CoreId::PRIMARY || core.0 >= engine.cores().count() || engine.idc().is_served(core) {
            tracing::error!(%core, "cannot start worker for core");
            return Err(PipelineError::InvalidCore(core));
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let worker_engine = Arc::clone(&engine);
        let handle = thread::Builder::new()
            .name(format!("cadence-core{core}"))
            .spawn(move || serve(&worker_engine, core, &rx))
            .map_err(|e| channel_error(core, &e))?;

        engine.idc().register(core, tx.clone());
        engine.cores().enable(core);
        tracing::info!(%core, "core worker started");

        Ok(Self {
            core,
            engine,
            tx,
            handle: Some(handle),
        })
    }

    /// Core this worker serves.
    pub fn core(&self) -> CoreId {
        self.core
    }

    /// Disables the core and joins the worker thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.engine.cores().disable(self.core);
        self.engine.idc().unregister(self.core);
        if self.tx.send(Envelope::Shutdown).is_err() {
            tracing::warn!(core = %self.core, "worker already gone");
        }
        if handle.join().is_err() {
            tracing::error!(core = %self.core, "worker panicked");
        }
        tracing::info!(core = %self.core, "core worker stopped");
    }
}

impl Drop for CoreWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve(engine: &Engine, core: CoreId, rx: &Receiver<Envelope>) {
    set_current_core(core);
    tracing::debug!(%core, "serving");

    for envelope in rx {
        match envelope {
            Envelope::Message { msg, reply } => {
                let result = engine.handle_idc(msg);
                if reply.send(result).is_err() {
                    tracing::warn!(%core, ?msg, "sender stopped waiting for reply");
                }
            }
            Envelope::Shutdown => break,
        }
    }
}
