//! Tasks: the unit of structured concurrency.
//!
//! Each task wraps one running saga. Tasks form a tree: a forked task is a
//! child of the task that forked it, a parent only completes once its own
//! body and every child are done, and cancellation flows from parents to
//! children.

mod handle;
pub(crate) mod record;
pub(crate) mod tree;

pub use handle::TaskHandle;
