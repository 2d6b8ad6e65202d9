//! Public handle to a task.

use super::record::TaskRecord;
use super::tree::TaskTree;
use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::types::{CancelKind, CancelReason, TaskId, TaskState};
use core::fmt;
use std::sync::{Arc, Weak};

/// A cloneable handle to a task.
///
/// Handles are `Send + Sync`: host code may cancel a task, latch an error
/// on it, or subscribe to its outcome from any thread while the scheduler
/// is stepping it. State changes requested through a handle are observed by
/// the scheduler on the task's next step.
#[derive(Clone)]
pub struct TaskHandle {
    record: Arc<TaskRecord>,
    tree: Weak<TaskTree>,
}

impl TaskHandle {
    pub(crate) fn new(record: Arc<TaskRecord>, tree: &Arc<TaskTree>) -> Self {
        Self {
            record,
            tree: Arc::downgrade(tree),
        }
    }

    /// Creates a handle to a task owned by no scheduler.
    ///
    /// Useful for driving sagas by hand: feed it into a `Fork` result cell
    /// and inspect what the saga does with it. Schedulers refuse to `Join`
    /// or `Cancel` detached handles.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            record: Arc::new(TaskRecord::new(TaskId::new_detached(), None)),
            tree: Weak::new(),
        }
    }

    pub(crate) fn record(&self) -> &TaskRecord {
        &self.record
    }

    /// Returns true if this handle was issued by the scheduler owning `tree`.
    pub(crate) fn belongs_to(&self, tree: &Arc<TaskTree>) -> bool {
        std::ptr::eq(self.tree.as_ptr(), Arc::as_ptr(tree))
    }

    /// The task's identifier.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.record.id()
    }

    /// The task's parent, if it still has one.
    #[must_use]
    pub fn parent(&self) -> Option<TaskId> {
        self.record.parent()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.record.state()
    }

    /// Returns true while the task has not reached a terminal state.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    /// Returns true once the body and all children finished.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// Returns true once the task observed a cancellation request.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.state() == TaskState::Canceled
    }

    /// Returns true once the task failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.state() == TaskState::Errored
    }

    /// Returns true for any terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Returns true once cancellation was requested, even if the task has
    /// not observed it yet.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.record.is_cancel_requested()
    }

    /// Why the task was asked to stop, if it was.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.record.cancel_reason()
    }

    /// The error latched on the task, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        self.record.error()
    }

    /// The token handed to the task's `Call` work.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.record.token().clone()
    }

    /// Requests cancellation. Returns `false` if the task is already
    /// terminal.
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::new(CancelKind::User))
    }

    /// Requests cancellation with an explicit reason.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        self.record.request_cancel(reason)
    }

    /// Latches `error` on the task, moving it to `Errored` and applying
    /// the error propagation policy. Returns `false` if the task was
    /// already terminal.
    pub fn set_error(&self, error: Error) -> bool {
        match self.tree.upgrade() {
            Some(tree) => tree.fail(&self.record, error),
            None => self.record.finish(TaskState::Errored, Some(error)),
        }
    }

    /// Runs `f` once when the task completes. Fires immediately if it
    /// already has; never fires if it ended any other way.
    pub fn on_completed<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.record.on_completed(Box::new(f));
    }

    /// Runs `f` once when the task is cancelled, with the final reason.
    pub fn on_canceled<F>(&self, f: F)
    where
        F: FnOnce(CancelReason) + Send + 'static,
    {
        self.record.on_canceled(Box::new(f));
    }

    /// Runs `f` once when the task fails, with the latched error.
    pub fn on_error<F>(&self, f: F)
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.record.on_error(Box::new(f));
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("cancel_requested", &self.is_cancel_requested())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn detached_handle_basics() {
        let handle = TaskHandle::detached();
        assert!(handle.id().is_detached());
        assert!(handle.is_running());
        assert!(handle.parent().is_none());
        assert_eq!(handle, handle.clone());
        assert_ne!(handle, TaskHandle::detached());
        assert!(format!("{handle:?}").contains("Running"));
    }

    #[test]
    fn cancel_trips_token_but_not_state() {
        let handle = TaskHandle::detached();
        let token = handle.cancellation_token();
        assert!(handle.cancel());
        assert!(token.is_cancelled());
        assert!(handle.is_cancel_requested());
        assert!(handle.is_running());
        assert_eq!(handle.cancel_reason().map(|r| r.kind()), Some(CancelKind::User));
    }

    #[test]
    fn observers_see_latched_error() {
        let handle = TaskHandle::detached();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        handle.on_error(move |err| {
            assert_eq!(err.context(), Some("failed"));
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(handle.set_error(Error::saga("failed")));
        assert!(!handle.set_error(Error::saga("second")));
        assert!(handle.is_error());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(handle.error().and_then(|e| e.context().map(String::from)).as_deref(), Some("failed"));
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Cancel,
        Fail,
        Complete,
        FinishCanceled,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Cancel),
            Just(Op::Fail),
            Just(Op::Complete),
            Just(Op::FinishCanceled),
        ]
    }

    proptest! {
        #[test]
        fn terminal_state_is_absorbing(ops in proptest::collection::vec(op(), 1..24)) {
            let handle = TaskHandle::detached();
            handle.record().mark_body_finished();
            let mut settled: Option<TaskState> = None;
            for op in ops {
                match op {
                    Op::Cancel => { handle.cancel(); }
                    Op::Fail => { handle.set_error(Error::saga("x")); }
                    Op::Complete => { handle.record().try_complete(); }
                    Op::FinishCanceled => { handle.record().finish(TaskState::Canceled, None); }
                }
                let state = handle.state();
                if let Some(settled) = settled {
                    prop_assert_eq!(state, settled);
                } else if state.is_terminal() {
                    settled = Some(state);
                }
                let flags = [handle.is_completed(), handle.is_canceled(), handle.is_error()];
                prop_assert!(flags.iter().filter(|f| **f).count() <= 1);
            }
        }
    }
}
