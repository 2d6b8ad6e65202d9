//! Task lifecycle states.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// `Running` is the only non-terminal state. The three terminal states are
/// mutually exclusive and absorbing: once a task leaves `Running` it never
/// changes state again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// The task's saga body (or its children) still has work to do.
    #[default]
    Running,
    /// The body finished and every child reached a terminal state.
    Completed,
    /// The task observed a cancellation request.
    Canceled,
    /// The body, or external work it awaited, failed.
    Errored,
}

impl TaskState {
    /// Returns true for `Completed`, `Canceled` and `Errored`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns true if a transition from `self` to `next` is legal.
    ///
    /// Re-entering the current state is accepted as a no-op; leaving a
    /// terminal state is not.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Running, _)
                | (Self::Completed, Self::Completed)
                | (Self::Canceled, Self::Canceled)
                | (Self::Errored, Self::Errored)
        )
    }

    /// Returns the state name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
