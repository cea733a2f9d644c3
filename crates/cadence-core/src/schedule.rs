//! Scheduler binding.
//!
//! Each pipeline owns one task, identified by the pipeline ID. The scheduler
//! invokes the task's callback ([`Engine::run_task`](crate::Engine::run_task))
//! when it is due; the callback returns the delay until its next run in
//! microseconds, or 0 to stop.
//!
//! [`ManualScheduler`] is a deterministic implementation driven by simulated
//! time, used by the CLI and the tests.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::cpu::CoreId;
use crate::graph::PipelineId;

/// Identifier of a scheduled task. Equal to the owning pipeline's ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u32);

impl From<PipelineId> for TaskId {
    fn from(id: PipelineId) -> Self {
        TaskId(id.0)
    }
}

impl From<TaskId> for PipelineId {
    fn from(id: TaskId) -> Self {
        PipelineId(id.0)
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a task is driven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Fixed-period invocation from the platform timer.
    #[default]
    Timer,
    /// Earliest-deadline-first invocation.
    Deadline,
}

/// Static task properties supplied to [`Scheduler::init`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskConfig {
    /// Timer or deadline driven.
    pub kind: TaskKind,
    /// Priority; lower runs first when several tasks are due together.
    pub priority: u32,
    /// Core the task runs on.
    pub core: CoreId,
}

/// Placement of a scheduled run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScheduleFlags {
    /// Run after the requested start delay.
    #[default]
    Normal,
    /// Run in the next idle slot, ignoring the start delay.
    Idle,
}

/// Clock source for timestamps.
pub trait Clock: Send + Sync {
    /// Current platform time in microseconds.
    fn now_us(&self) -> u64;
}

/// Periodic/deadline task runner.
pub trait Scheduler: Send + Sync {
    /// Registers `task`. Re-initialising a known task replaces its config.
    fn init(&self, task: TaskId, config: TaskConfig);

    /// Queues `task` to run `start_us` from now. `period_us` is the nominal
    /// period, used by timer-driven implementations for drift correction.
    fn schedule(&self, task: TaskId, start_us: u64, period_us: u64, flags: ScheduleFlags);

    /// Removes `task` from the run queue.
    ///
    /// Blocks until a run of the task already in progress on another thread
    /// has finished. Returns false if the task is unknown.
    fn cancel(&self, task: TaskId) -> bool;

    /// Cancels and forgets `task`.
    fn free(&self, task: TaskId);
}

#[derive(Debug)]
struct TaskEntry {
    config: TaskConfig,
    due: Option<u64>,
    period_us: u64,
    in_flight: bool,
    runs: u64,
}

#[derive(Debug, Default)]
struct ManualState {
    now: u64,
    tasks: BTreeMap<TaskId, TaskEntry>,
}

/// Deterministic scheduler driven by [`advance`](Self::advance).
///
/// A task that is due is taken out of the queue for the duration of its run.
/// After the callback returns, the task is queued again with the returned
/// delay unless the callback already rescheduled it; a return of 0 leaves it
/// unscheduled.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    /// Creates a scheduler at time zero with no tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time in microseconds.
    pub fn now(&self) -> u64 {
        self.state.lock().now
    }

    /// Returns true if `task` is queued.
    pub fn is_scheduled(&self, task: TaskId) -> bool {
        self.state
            .lock()
            .tasks
            .get(&task)
            .is_some_and(|t| t.due.is_some())
    }

    /// Absolute time `task` is due at, if queued.
    pub fn due(&self, task: TaskId) -> Option<u64> {
        self.state.lock().tasks.get(&task).and_then(|t| t.due)
    }

    /// Number of times `task` has run.
    pub fn run_count(&self, task: TaskId) -> u64 {
        self.state.lock().tasks.get(&task).map_or(0, |t| t.runs)
    }

    /// Nominal period last requested for `task`.
    pub fn period(&self, task: TaskId) -> Option<u64> {
        self.state.lock().tasks.get(&task).map(|t| t.period_us)
    }

    /// Returns true if `task` is known.
    pub fn contains(&self, task: TaskId) -> bool {
        self.state.lock().tasks.contains_key(&task)
    }

    /// Advances time by `us`, running every task that becomes due.
    ///
    /// `run` is the task callback. It is invoked without the scheduler lock
    /// held, so it may call back into the scheduler. Returns the number of runs
    /// performed.
    pub fn advance(&self, us: u64, mut run: impl FnMut(TaskId) -> u64) -> usize {
        let target = self.state.lock().now.saturating_add(us);
        let mut performed = 0;

        while let Some(task) = self.take_due(target) {
            let delay = run(task);
            performed += 1;

            let mut state = self.state.lock();
            let now = state.now;
            if let Some(entry) = state.tasks.get_mut(&task) {
                entry.in_flight = false;
                entry.runs += 1;
                if entry.due.is_none() && delay > 0 {
                    entry.due = Some(now + delay);
                }
            }
        }

        self.state.lock().now = target;
        performed
    }

    /// Runs every task due at the current time without advancing it.
    pub fn run_pending(&self, run: impl FnMut(TaskId) -> u64) -> usize {
        self.advance(0, run)
    }

    fn take_due(&self, target: u64) -> Option<TaskId> {
        let mut state = self.state.lock();
        let (task, due) = state
            .tasks
            .iter()
            .filter_map(|(id, t)| t.due.map(|due| (due, t.config.priority, *id)))
            .filter(|(due, _, _)| *due <= target)
            .min()
            .map(|(due, _, id)| (id, due))?;

        if due > state.now {
            state.now = due;
        }
        let entry = state.tasks.get_mut(&task)?;
        entry.due = None;
        entry.in_flight = true;
        Some(task)
    }
}

impl Scheduler for ManualScheduler {
    fn init(&self, task: TaskId, config: TaskConfig) {
        tracing::debug!(%task, ?config, "task init");
        self.state.lock().tasks.insert(
            task,
            TaskEntry {
                config,
                due: None,
                period_us: 0,
                in_flight: false,
                runs: 0,
            },
        );
    }

    fn schedule(&self, task: TaskId, start_us: u64, period_us: u64, flags: ScheduleFlags) {
        let mut state = self.state.lock();
        let now = state.now;
        let Some(entry) = state.tasks.get_mut(&task) else {
            tracing::warn!(%task, "schedule of unknown task ignored");
            return;
        };
        let due = match flags {
            ScheduleFlags::Normal => now + start_us,
            ScheduleFlags::Idle => now,
        };
        entry.due = Some(due);
        entry.period_us = period_us;
        tracing::trace!(%task, due, ?flags, "task scheduled");
    }

    fn cancel(&self, task: TaskId) -> bool {
        // Runs execute on the thread calling `advance`, and a cancel issued
        // from inside a run must not wait for itself, so there is nothing to
        // block on here.
        let mut state = self.state.lock();
        let Some(entry) = state.tasks.get_mut(&task) else {
            return false;
        };
        entry.due = None;
        tracing::trace!(%task, in_flight = entry.in_flight, "task cancelled");
        true
    }

    fn free(&self, task: TaskId) {
        self.state.lock().tasks.remove(&task);
    }
}

impl Clock for ManualScheduler {
    fn now_us(&self) -> u64 {
        self.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(priority: u32) -> TaskConfig {
        TaskConfig {
            kind: TaskKind::Timer,
            priority,
            core: CoreId::PRIMARY,
        }
    }

    #[test]
    fn periodic_task_requeues_with_returned_delay() {
        let sched = ManualScheduler::new();
        sched.init(TaskId(1), config(0));
        sched.schedule(TaskId(1), 1000, 1000, ScheduleFlags::Normal);

        let runs = sched.advance(3500, |_| 1000);
        assert_eq!(runs, 3);
        assert_eq!(sched.now(), 3500);
        assert_eq!(sched.due(TaskId(1)), Some(4000));
    }

    #[test]
    fn zero_delay_stops_task() {
        let sched = ManualScheduler::new();
        sched.init(TaskId(1), config(0));
        sched.schedule(TaskId(1), 0, 1000, ScheduleFlags::Idle);
        assert_eq!(sched.advance(10_000, |_| 0), 1);
        assert!(!sched.is_scheduled(TaskId(1)));
    }

    #[test]
    fn reschedule_inside_run_wins_over_return_value() {
        let sched = ManualScheduler::new();
        sched.init(TaskId(1), config(0));
        sched.schedule(TaskId(1), 0, 1000, ScheduleFlags::Idle);
        let mut first = true;
        sched.advance(0, |task| {
            if first {
                first = false;
                sched.schedule(task, 500, 1000, ScheduleFlags::Normal);
            }
            1000
        });
        assert_eq!(sched.due(TaskId(1)), Some(500));
    }

    #[test]
    fn due_tasks_run_in_priority_order() {
        let sched = ManualScheduler::new();
        sched.init(TaskId(1), config(5));
        sched.init(TaskId(2), config(1));
        sched.schedule(TaskId(1), 100, 100, ScheduleFlags::Normal);
        sched.schedule(TaskId(2), 100, 100, ScheduleFlags::Normal);
        let mut order = Vec::new();
        sched.advance(100, |task| {
            order.push(task);
            0
        });
        assert_eq!(order, vec![TaskId(2), TaskId(1)]);
    }

    #[test]
    fn cancel_dequeues_and_free_forgets() {
        let sched = ManualScheduler::new();
        sched.init(TaskId(3), config(0));
        sched.schedule(TaskId(3), 10, 10, ScheduleFlags::Normal);
        assert!(sched.cancel(TaskId(3)));
        assert!(!sched.is_scheduled(TaskId(3)));
        assert_eq!(sched.advance(100, |_| 10), 0);
        sched.free(TaskId(3));
        assert!(!sched.contains(TaskId(3)));
        assert!(!sched.cancel(TaskId(3)));
    }
}
