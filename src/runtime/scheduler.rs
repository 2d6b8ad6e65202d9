//! The tick-driven scheduler.
//!
//! A tick walks the active list once, stepping each task. A step resolves
//! the task's pending suspension if it can, then resumes its saga until the
//! saga suspends, yields a tick boundary, finishes or exhausts the effect
//! budget. Tasks that reach a terminal state are swap-removed from the list
//! and their records dropped from the tree.
//!
//! Spawned tasks go to a pending list that joins the active list at the
//! start of the next tick. A root started between ticks therefore runs on
//! the very next tick, while a task forked during a walk waits for the
//! following one.

use super::runner::{EffectRunner, Outcome, Spawn};
use super::suspension::Suspension;
use crate::config::SchedulerConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::saga::{BoxSaga, Step, Yielded};
use crate::store::{ActionStream, Store};
use crate::task::TaskHandle;
use crate::task::tree::TaskTree;
use crate::tracing_compat::{debug, error, trace};
use crate::types::{CancelReason, TaskState};
use serde::Serialize;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::task::Poll;

/// Counters describing scheduler activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Ticks run so far.
    pub ticks: u64,
    /// Tasks on the active list.
    pub live_tasks: usize,
    /// Tasks spawned but not yet on the active list.
    pub pending_tasks: usize,
    /// Tasks ever spawned.
    pub tasks_spawned: u64,
    /// Tasks retired as `Completed`.
    pub tasks_completed: u64,
    /// Tasks retired as `Canceled`.
    pub tasks_canceled: u64,
    /// Tasks retired as `Errored`.
    pub tasks_errored: u64,
    /// Effects handed to the runner.
    pub effects_interpreted: u64,
    /// Panics caught while stepping a task.
    pub panics_caught: u64,
}

/// One scheduled task: its handle, its saga stack and what it waits on.
pub(crate) struct TaskSlot<S, A> {
    task: TaskHandle,
    /// Innermost saga last. Nested sagas run to completion before the
    /// saga that yielded them resumes.
    stack: Vec<BoxSaga<S, A>>,
    suspension: Option<Suspension<A>>,
}

impl<S, A> TaskSlot<S, A> {
    fn new(task: TaskHandle, saga: BoxSaga<S, A>) -> Self {
        Self {
            task,
            stack: vec![saga],
            suspension: None,
        }
    }

    fn clear(&mut self) {
        self.suspension = None;
        self.stack.clear();
    }
}

struct Spawner<'a, S, A> {
    tree: &'a Arc<TaskTree>,
    pending: &'a mut Vec<TaskSlot<S, A>>,
    limit: Option<usize>,
    stats: &'a mut SchedulerStats,
}

impl<S, A> Spawn<S, A> for Spawner<'_, S, A> {
    fn spawn(&mut self, saga: BoxSaga<S, A>, parent: Option<&TaskHandle>) -> Result<TaskHandle> {
        if let Some(limit) = self.limit
            && self.tree.len() >= limit
        {
            return Err(Error::new(ErrorKind::CapacityExceeded)
                .with_context(format!("live task limit of {limit} reached")));
        }
        let record = self.tree.insert(parent.map(TaskHandle::id));
        let task = TaskHandle::new(record, self.tree);
        self.pending.push(TaskSlot::new(task.clone(), saga));
        self.stats.tasks_spawned += 1;
        Ok(task)
    }

    fn owns(&self, task: &TaskHandle) -> bool {
        task.belongs_to(self.tree)
    }
}

/// Drives sagas one tick at a time.
pub struct Scheduler<S, A> {
    tree: Arc<TaskTree>,
    runner: EffectRunner<S, A>,
    items: Vec<TaskSlot<S, A>>,
    pending: Vec<TaskSlot<S, A>>,
    config: SchedulerConfig,
    stats: SchedulerStats,
}

impl<S: 'static, A: Clone + 'static> Scheduler<S, A> {
    /// Creates a scheduler over the given collaborators.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `config` does not validate.
    pub fn new(
        store: Arc<dyn Store<S, A>>,
        stream: Arc<dyn ActionStream<A>>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tree: Arc::new(TaskTree::new(
                config.initial_capacity,
                config.cancel_children_on_error,
            )),
            runner: EffectRunner::new(store, stream),
            items: Vec::with_capacity(config.initial_capacity),
            pending: Vec::new(),
            config,
            stats: SchedulerStats::default(),
        })
    }

    /// The effect runner.
    #[must_use]
    pub const fn runner(&self) -> &EffectRunner<S, A> {
        &self.runner
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Starts `saga` as a root task. It first runs on the next tick.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if the live task limit is reached.
    pub fn spawn(&mut self, saga: BoxSaga<S, A>) -> Result<TaskHandle> {
        let task = self.spawner().spawn(saga, None)?;
        debug!(task = %task.id(), "root task spawned");
        Ok(task)
    }

    /// Runs one tick.
    pub fn tick(&mut self) {
        self.stats.ticks += 1;
        let mut items = std::mem::take(&mut self.items);
        let added = self.pending.len();
        items.append(&mut self.pending);
        let mut i = 0;
        while i < items.len() {
            if self.step_isolated(&mut items[i]) {
                i += 1;
            } else {
                let slot = items.swap_remove(i);
                self.retire(&slot);
            }
        }
        self.items = items;
        trace!(
            tick = self.stats.ticks,
            live = self.items.len(),
            added,
            deferred = self.pending.len(),
            "tick finished"
        );
    }

    /// Requests cancellation of every live root task. Returns how many
    /// requests were new.
    pub fn shutdown(&mut self) -> usize {
        let cancelled = self
            .tree
            .roots()
            .iter()
            .filter(|root| root.request_cancel(CancelReason::shutdown()))
            .count();
        debug!(cancelled, "scheduler shutdown requested");
        cancelled
    }

    /// Tasks not yet retired, pending ones included.
    #[must_use]
    pub fn live_tasks(&self) -> usize {
        self.items.len() + self.pending.len()
    }

    /// Returns true when no task is left to run.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.live_tasks() == 0
    }

    /// A snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            live_tasks: self.items.len(),
            pending_tasks: self.pending.len(),
            ..self.stats
        }
    }

    fn spawner(&mut self) -> Spawner<'_, S, A> {
        Spawner {
            tree: &self.tree,
            pending: &mut self.pending,
            limit: self.config.max_live_tasks,
            stats: &mut self.stats,
        }
    }

    /// Steps `slot`, turning a panic into an `Errored` task when panics
    /// are caught.
    fn step_isolated(&mut self, slot: &mut TaskSlot<S, A>) -> bool {
        if !self.config.catch_panics {
            return self.step(slot);
        }
        match catch_unwind(AssertUnwindSafe(|| self.step(slot))) {
            Ok(keep) => keep,
            Err(payload) => {
                self.stats.panics_caught += 1;
                let message = panic_message(payload.as_ref());
                error!(task = %slot.task.id(), panic = %message, "saga panicked");
                self.fail(slot, Error::new(ErrorKind::Panicked).with_context(message));
                false
            }
        }
    }

    /// Advances one task. Returns false once it is terminal.
    fn step(&mut self, slot: &mut TaskSlot<S, A>) -> bool {
        let task = slot.task.clone();
        if task.is_terminal() {
            slot.clear();
            return false;
        }
        if task.is_cancel_requested() {
            self.cancel(slot);
            return false;
        }

        if let Some(wait) = slot.suspension.as_mut() {
            match wait.poll() {
                Poll::Pending => return true,
                Poll::Ready(Ok(())) => {
                    trace!(task = %task.id(), wait = wait.kind(), "suspension resolved");
                    slot.suspension = None;
                }
                Poll::Ready(Err(err)) => {
                    self.fail(slot, err);
                    return false;
                }
            }
        }

        let mut budget = self.config.max_effects_per_step;
        loop {
            if task.is_terminal() {
                slot.clear();
                return false;
            }
            if task.is_cancel_requested() {
                self.cancel(slot);
                return false;
            }
            let Some(body) = slot.stack.last_mut() else {
                task.record().mark_body_finished();
                return !self.tree.try_complete(task.record());
            };
            if budget == 0 {
                return true;
            }
            budget -= 1;

            match body.resume() {
                Step::Yield(Yielded::Nested(inner)) => slot.stack.push(inner),
                Step::Yield(Yielded::Tick) => return true,
                Step::Yield(Yielded::Effect(effect)) => {
                    self.stats.effects_interpreted += 1;
                    let mut spawner = Spawner {
                        tree: &self.tree,
                        pending: &mut self.pending,
                        limit: self.config.max_live_tasks,
                        stats: &mut self.stats,
                    };
                    match self.runner.interpret(effect, &task, &mut spawner) {
                        Ok(Outcome::Continue) => {}
                        Ok(Outcome::Suspend(mut wait)) => match wait.poll() {
                            Poll::Pending => {
                                slot.suspension = Some(wait);
                                return true;
                            }
                            Poll::Ready(Ok(())) => {}
                            Poll::Ready(Err(err)) => {
                                self.fail(slot, err);
                                return false;
                            }
                        },
                        Err(err) => {
                            self.fail(slot, err);
                            return false;
                        }
                    }
                }
                Step::Done => {
                    slot.stack.pop();
                }
                Step::Faulted(err) => {
                    self.fail(slot, err);
                    return false;
                }
            }
        }
    }

    /// Runs the cancel hooks innermost first, then finishes the task as
    /// `Canceled`.
    fn cancel(&self, slot: &mut TaskSlot<S, A>) {
        for body in slot.stack.iter_mut().rev() {
            body.on_cancel();
        }
        slot.clear();
        self.tree.finish_canceled(slot.task.record());
    }

    fn fail(&self, slot: &mut TaskSlot<S, A>, err: Error) {
        slot.clear();
        self.tree.fail(slot.task.record(), err);
    }

    fn retire(&mut self, slot: &TaskSlot<S, A>) {
        let state = slot.task.state();
        match state {
            TaskState::Completed => self.stats.tasks_completed += 1,
            TaskState::Canceled => self.stats.tasks_canceled += 1,
            TaskState::Errored => self.stats.tasks_errored += 1,
            TaskState::Running => {}
        }
        self.tree.remove(slot.task.id());
        trace!(task = %slot.task.id(), state = %state, "task retired");
    }
}

impl<S, A> std::fmt::Debug for Scheduler<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("live", &self.items.len())
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
