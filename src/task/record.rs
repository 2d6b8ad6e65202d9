//! Per-task bookkeeping.
//!
//! A [`TaskRecord`] lives in the task tree's arena and is shared with every
//! [`TaskHandle`](super::TaskHandle) for the task. All mutable state sits
//! behind one per-task lock; outcome observers are always invoked after that
//! lock is released.

use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::tracing_compat::debug;
use crate::types::{CancelReason, TaskId, TaskState};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};

type CompletedFn = Box<dyn FnOnce() + Send>;
type CanceledFn = Box<dyn FnOnce(CancelReason) + Send>;
type ErrorFn = Box<dyn FnOnce(Error) + Send>;

#[derive(Default)]
struct Observers {
    completed: Vec<CompletedFn>,
    canceled: Vec<CanceledFn>,
    errored: Vec<ErrorFn>,
}

/// Observers released by a terminal transition, fired outside the lock.
enum Fired {
    Completed(Vec<CompletedFn>),
    Canceled(Vec<CanceledFn>, CancelReason),
    Errored(Vec<ErrorFn>, Error),
}

impl Fired {
    fn fire(self) {
        match self {
            Self::Completed(fns) => fns.into_iter().for_each(|f| f()),
            Self::Canceled(fns, reason) => fns.into_iter().for_each(|f| f(reason)),
            Self::Errored(fns, err) => fns.into_iter().for_each(|f| f(err.clone())),
        }
    }
}

struct TaskCore {
    state: TaskState,
    error: Option<Error>,
    cancel_reason: Option<CancelReason>,
    parent: Option<TaskId>,
    children: SmallVec<[TaskId; 4]>,
    body_finished: bool,
    observers: Observers,
}

impl TaskCore {
    /// Moves to a terminal state and hands back the observers to fire.
    fn terminate(&mut self, to: TaskState, error: Option<Error>) -> Option<Fired> {
        if !to.is_terminal() || self.state.is_terminal() || !self.state.can_transition_to(to) {
            return None;
        }
        self.state = to;
        let observers = std::mem::take(&mut self.observers);
        match to {
            TaskState::Completed => Some(Fired::Completed(observers.completed)),
            TaskState::Canceled => {
                let reason = self.cancel_reason.unwrap_or_default();
                self.cancel_reason = Some(reason);
                Some(Fired::Canceled(observers.canceled, reason))
            }
            TaskState::Errored => {
                let err = error.unwrap_or_else(|| Error::saga("task errored"));
                self.error = Some(err.clone());
                Some(Fired::Errored(observers.errored, err))
            }
            TaskState::Running => None,
        }
    }
}

/// Shared state of one task.
pub(crate) struct TaskRecord {
    id: TaskId,
    core: Mutex<TaskCore>,
    cancel_requested: AtomicBool,
    token: CancellationToken,
}

impl TaskRecord {
    pub(crate) fn new(id: TaskId, parent: Option<TaskId>) -> Self {
        Self {
            id,
            core: Mutex::new(TaskCore {
                state: TaskState::Running,
                error: None,
                cancel_reason: None,
                parent,
                children: SmallVec::new(),
                body_finished: false,
                observers: Observers::default(),
            }),
            cancel_requested: AtomicBool::new(false),
            token: CancellationToken::new(),
        }
    }

    pub(crate) const fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn state(&self) -> TaskState {
        self.core.lock().state
    }

    pub(crate) fn error(&self) -> Option<Error> {
        self.core.lock().error.clone()
    }

    pub(crate) fn cancel_reason(&self) -> Option<CancelReason> {
        self.core.lock().cancel_reason
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn parent(&self) -> Option<TaskId> {
        self.core.lock().parent
    }

    pub(crate) fn children(&self) -> SmallVec<[TaskId; 4]> {
        self.core.lock().children.clone()
    }

    pub(crate) fn add_child(&self, child: TaskId) {
        let mut core = self.core.lock();
        if !core.children.contains(&child) {
            core.children.push(child);
        }
    }

    pub(crate) fn remove_child(&self, child: TaskId) {
        let mut core = self.core.lock();
        if let Some(pos) = core.children.iter().position(|c| *c == child) {
            core.children.swap_remove(pos);
        }
    }

    /// Empties the child set, returning the former children.
    pub(crate) fn take_children(&self) -> SmallVec<[TaskId; 4]> {
        std::mem::take(&mut self.core.lock().children)
    }

    pub(crate) fn clear_parent(&self) {
        self.core.lock().parent = None;
    }

    pub(crate) fn mark_body_finished(&self) {
        self.core.lock().body_finished = true;
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// Records a cancellation request and trips the task's token.
    ///
    /// Returns `false` if the task is already terminal. Repeated requests
    /// strengthen the recorded reason.
    pub(crate) fn request_cancel(&self, reason: CancelReason) -> bool {
        let first = {
            let mut core = self.core.lock();
            if core.state.is_terminal() {
                return false;
            }
            let first = core.cancel_reason.is_none();
            let merged = core.cancel_reason.map_or(reason, |mut existing| {
                existing.strengthen(&reason);
                existing
            });
            core.cancel_reason = Some(merged);
            first
        };
        self.cancel_requested.store(true, Ordering::Release);
        self.token.cancel();
        if first {
            debug!(task = %self.id, reason = %reason, "cancel requested");
        }
        true
    }

    /// Transitions to a terminal state, firing observers. Returns `false`
    /// if the task was already terminal.
    pub(crate) fn finish(&self, to: TaskState, error: Option<Error>) -> bool {
        let fired = self.core.lock().terminate(to, error);
        fired.map(Fired::fire).is_some()
    }

    /// Completes the task if its body is done and it has no children.
    pub(crate) fn try_complete(&self) -> bool {
        let fired = {
            let mut core = self.core.lock();
            if !core.body_finished || !core.children.is_empty() {
                return false;
            }
            core.terminate(TaskState::Completed, None)
        };
        fired.map(Fired::fire).is_some()
    }

    pub(crate) fn on_completed(&self, f: CompletedFn) {
        let mut core = self.core.lock();
        let state = core.state;
        match state {
            TaskState::Running => core.observers.completed.push(f),
            TaskState::Completed => {
                drop(core);
                f();
            }
            TaskState::Canceled | TaskState::Errored => {}
        }
    }

    pub(crate) fn on_canceled(&self, f: CanceledFn) {
        let mut core = self.core.lock();
        let state = core.state;
        match state {
            TaskState::Running => core.observers.canceled.push(f),
            TaskState::Canceled => {
                let reason = core.cancel_reason.unwrap_or_default();
                drop(core);
                f(reason);
            }
            TaskState::Completed | TaskState::Errored => {}
        }
    }

    pub(crate) fn on_error(&self, f: ErrorFn) {
        let mut core = self.core.lock();
        let state = core.state;
        match state {
            TaskState::Running => core.observers.errored.push(f),
            TaskState::Errored => {
                let err = core
                    .error
                    .clone()
                    .unwrap_or_else(|| Error::saga("task errored"));
                drop(core);
                f(err);
            }
            TaskState::Completed | TaskState::Canceled => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn record() -> TaskRecord {
        TaskRecord::new(TaskId::new_for_test(1, 0), None)
    }

    #[test]
    fn terminal_transition_happens_once() {
        let rec = record();
        assert!(rec.finish(TaskState::Canceled, None));
        assert!(!rec.finish(TaskState::Completed, None));
        assert!(!rec.finish(TaskState::Errored, Some(Error::saga("late"))));
        assert_eq!(rec.state(), TaskState::Canceled);
        assert!(rec.error().is_none());
    }

    #[test]
    fn try_complete_waits_for_body_and_children() {
        let rec = record();
        let child = TaskId::new_for_test(2, 0);
        rec.add_child(child);
        assert!(!rec.try_complete());
        rec.mark_body_finished();
        assert!(!rec.try_complete());
        rec.remove_child(child);
        assert!(rec.try_complete());
        assert_eq!(rec.state(), TaskState::Completed);
    }

    #[test]
    fn observers_fire_once_and_latch() {
        let rec = record();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        rec.on_error(Box::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        let never = Arc::clone(&hits);
        rec.on_completed(Box::new(move || {
            never.fetch_add(100, Ordering::SeqCst);
        }));

        rec.finish(TaskState::Errored, Some(Error::saga("boom")));
        rec.finish(TaskState::Errored, Some(Error::saga("again")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Late subscriber sees the latched error immediately.
        let late = Arc::clone(&hits);
        rec.on_error(Box::new(move |err| {
            assert_eq!(err.context(), Some("boom"));
            late.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancel_request_strengthens_reason() {
        let rec = record();
        assert!(rec.request_cancel(CancelReason::user("test")));
        assert!(rec.request_cancel(CancelReason::parent_errored()));
        assert!(rec.is_cancel_requested());
        assert!(rec.token().is_cancelled());
        assert_eq!(
            rec.cancel_reason().map(|r| r.kind()),
            Some(crate::types::CancelKind::ParentErrored)
        );
        rec.finish(TaskState::Canceled, None);
        assert!(!rec.request_cancel(CancelReason::user("test")));
    }
}
