//! The task tree.
//!
//! Records live in a generational arena keyed by [`TaskId`]; parent and
//! child links are ids, never pointers, so a finished task can be dropped
//! from the arena while handles and stale links still refer to it. Looking
//! up a removed id simply yields `None`.
//!
//! Locking: the arena lock is only held to insert, remove or clone a record
//! out. It is never held while a record's own lock is taken, and no code
//! path holds two record locks at once.

use super::record::TaskRecord;
use crate::error::Error;
use crate::tracing_compat::{debug, warn};
use crate::types::{CancelReason, TaskId, TaskState};
use crate::util::Arena;
use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) struct TaskTree {
    tasks: Mutex<Arena<Arc<TaskRecord>>>,
    cancel_children_on_error: bool,
}

impl TaskTree {
    pub(crate) fn new(capacity: usize, cancel_children_on_error: bool) -> Self {
        Self {
            tasks: Mutex::new(Arena::with_capacity(capacity)),
            cancel_children_on_error,
        }
    }

    /// Number of records in the arena, terminal ones not yet retired included.
    pub(crate) fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<Arc<TaskRecord>> {
        self.tasks.lock().get(id.arena_index()).cloned()
    }

    /// Creates a record and links it under `parent`.
    pub(crate) fn insert(&self, parent: Option<TaskId>) -> Arc<TaskRecord> {
        let record = {
            let mut tasks = self.tasks.lock();
            let id = TaskId::from_arena(tasks.next_index());
            let record = Arc::new(TaskRecord::new(id, parent));
            tasks.insert(Arc::clone(&record));
            record
        };
        if let Some(parent) = parent.and_then(|id| self.get(id)) {
            parent.add_child(record.id());
        }
        debug!(task = %record.id(), parent = ?parent, "task created");
        record
    }

    /// Drops a retired record from the arena.
    pub(crate) fn remove(&self, id: TaskId) {
        self.tasks.lock().remove(id.arena_index());
    }

    /// Records of every live task without a parent.
    pub(crate) fn roots(&self) -> Vec<Arc<TaskRecord>> {
        let records: Vec<Arc<TaskRecord>> =
            self.tasks.lock().iter().map(|(_, r)| Arc::clone(r)).collect();
        records
            .into_iter()
            .filter(|r| r.parent().is_none() && !r.state().is_terminal())
            .collect()
    }

    fn detach_from_parent(&self, record: &TaskRecord) {
        if let Some(parent) = record.parent().and_then(|id| self.get(id)) {
            parent.remove_child(record.id());
        }
    }

    fn cancel_children(&self, record: &TaskRecord, reason: CancelReason) {
        for child in record.children() {
            if let Some(child) = self.get(child) {
                child.request_cancel(reason);
            }
        }
    }

    /// Latches `error` on the task and applies the cross-task policy.
    ///
    /// A root cancels every live child and forgets them. A child detaches
    /// from its parent and, if configured, cancels its own children.
    pub(crate) fn fail(&self, record: &TaskRecord, error: Error) -> bool {
        let message = error.to_string();
        if !record.finish(TaskState::Errored, Some(error)) {
            return false;
        }
        warn!(task = %record.id(), error = %message, "task errored");
        if record.parent().is_none() {
            for child in record.take_children() {
                if let Some(child) = self.get(child) {
                    child.clear_parent();
                    child.request_cancel(CancelReason::parent_errored());
                }
            }
        } else {
            self.detach_from_parent(record);
            if self.cancel_children_on_error {
                self.cancel_children(record, CancelReason::parent_errored());
            }
        }
        true
    }

    /// Moves a cancel-requested task to `Canceled` and passes the request
    /// on to its children.
    pub(crate) fn finish_canceled(&self, record: &TaskRecord) -> bool {
        if !record.finish(TaskState::Canceled, None) {
            return false;
        }
        debug!(task = %record.id(), "task canceled");
        self.cancel_children(record, CancelReason::parent_cancelled());
        self.detach_from_parent(record);
        true
    }

    /// Completes the task if its body is done and it has no live children.
    pub(crate) fn try_complete(&self, record: &TaskRecord) -> bool {
        if !record.try_complete() {
            return false;
        }
        debug!(task = %record.id(), "task completed");
        self.detach_from_parent(record);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_links_parent_and_child() {
        let tree = TaskTree::new(4, true);
        let root = tree.insert(None);
        let child = tree.insert(Some(root.id()));
        assert_eq!(root.children().as_slice(), &[child.id()]);
        assert_eq!(child.parent(), Some(root.id()));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.roots().len(), 1);
    }

    #[test]
    fn completed_child_detaches_and_parent_completes() {
        let tree = TaskTree::new(4, true);
        let root = tree.insert(None);
        let child = tree.insert(Some(root.id()));
        root.mark_body_finished();
        assert!(!tree.try_complete(&root));

        child.mark_body_finished();
        assert!(tree.try_complete(&child));
        assert!(root.children().is_empty());
        assert!(tree.try_complete(&root));
        assert_eq!(root.state(), TaskState::Completed);
    }

    #[test]
    fn root_error_cancels_and_forgets_children() {
        let tree = TaskTree::new(4, true);
        let root = tree.insert(None);
        let a = tree.insert(Some(root.id()));
        let b = tree.insert(Some(root.id()));
        assert!(tree.fail(&root, Error::saga("root failed")));
        assert!(root.children().is_empty());
        for child in [&a, &b] {
            assert!(child.is_cancel_requested());
            assert!(child.parent().is_none());
            assert_eq!(
                child.cancel_reason().map(|r| r.kind()),
                Some(crate::types::CancelKind::ParentErrored)
            );
        }
    }

    #[test]
    fn child_error_detaches_without_touching_parent() {
        let tree = TaskTree::new(4, false);
        let root = tree.insert(None);
        let child = tree.insert(Some(root.id()));
        let grandchild = tree.insert(Some(child.id()));
        assert!(tree.fail(&child, Error::saga("child failed")));
        assert!(root.children().is_empty());
        assert_eq!(root.state(), TaskState::Running);
        assert!(!root.is_cancel_requested());
        assert!(!grandchild.is_cancel_requested());
    }

    #[test]
    fn cancel_cascades_to_children() {
        let tree = TaskTree::new(4, true);
        let root = tree.insert(None);
        let child = tree.insert(Some(root.id()));
        root.request_cancel(CancelReason::user("stop"));
        assert!(tree.finish_canceled(&root));
        assert!(child.is_cancel_requested());
        assert!(!tree.finish_canceled(&root));
    }

    #[test]
    fn removed_ids_are_not_resolved() {
        let tree = TaskTree::new(4, true);
        let task = tree.insert(None);
        tree.remove(task.id());
        assert!(tree.get(task.id()).is_none());
        let reused = tree.insert(None);
        assert_ne!(reused.id(), task.id());
    }
}
