//! What a task is parked on between ticks.

use super::stored_call::StoredCall;
use crate::error::Result;
use crate::store::Subscription;
use crate::task::TaskHandle;
use crate::types::{CancelReason, ReturnData};
use std::task::Poll;

/// A task's pending wait. Polled at the start of each of its steps.
pub(crate) enum Suspension<A> {
    /// External work started by a `Call`.
    Call(StoredCall),
    /// A one-shot action subscription.
    Take {
        subscription: Subscription<A>,
        result: Option<ReturnData<A>>,
    },
    /// Waiting for one task to be terminal.
    Join(TaskHandle),
    /// Waiting for every child of an `All` to be terminal.
    All(Vec<TaskHandle>),
    /// Waiting for the first child of a `Race` to be terminal.
    Race {
        tasks: Vec<TaskHandle>,
        winner: Option<ReturnData<usize>>,
    },
}

impl<A: Clone> Suspension<A> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Call(call) => call.label(),
            Self::Take { .. } => "take",
            Self::Join(_) => "join",
            Self::All(_) => "all",
            Self::Race { .. } => "race",
        }
    }

    /// Checks whether the wait is over.
    ///
    /// `All` and `Race` cancel their remaining children when they resolve;
    /// cancelling an already-terminal task is a no-op.
    pub(crate) fn poll(&mut self) -> Poll<Result<()>> {
        match self {
            Self::Call(call) => call.poll(),
            Self::Take {
                subscription,
                result,
            } => match subscription.try_recv() {
                Some(action) => {
                    if let Some(result) = result {
                        result.set(action);
                    }
                    Poll::Ready(Ok(()))
                }
                None => Poll::Pending,
            },
            Self::Join(task) => {
                if task.is_terminal() {
                    Poll::Ready(Ok(()))
                } else {
                    Poll::Pending
                }
            }
            Self::All(tasks) => {
                if !tasks.iter().all(TaskHandle::is_terminal) {
                    return Poll::Pending;
                }
                for task in tasks.iter() {
                    task.cancel_with(CancelReason::combinator_cleanup());
                }
                Poll::Ready(Ok(()))
            }
            Self::Race { tasks, winner } => {
                let Some(first) = tasks.iter().position(TaskHandle::is_terminal) else {
                    return Poll::Pending;
                };
                if let Some(winner) = winner {
                    winner.set(first);
                }
                for (i, task) in tasks.iter().enumerate() {
                    if i != first {
                        task.cancel_with(CancelReason::race_lost());
                    }
                }
                Poll::Ready(Ok(()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::{ActionChannel, ActionStream};
    use crate::types::CancelKind;
    use std::sync::Arc;

    fn finished() -> TaskHandle {
        let task = TaskHandle::detached();
        task.set_error(Error::saga("done"));
        task
    }

    #[test]
    fn take_resolves_on_matching_action() {
        let channel = ActionChannel::new();
        let result = ReturnData::new();
        let mut wait = Suspension::Take {
            subscription: channel.subscribe(Arc::new(|a: &u32| *a > 10)),
            result: Some(result.clone()),
        };
        assert!(wait.poll().is_pending());
        channel.publish(&3);
        assert!(wait.poll().is_pending());
        channel.publish(&11);
        assert!(wait.poll().is_ready());
        assert_eq!(result.value(), 11);
        assert_eq!(wait.kind(), "take");
    }

    #[test]
    fn all_waits_for_every_task_then_sweeps() {
        let done = finished();
        let running = TaskHandle::detached();
        let mut wait: Suspension<()> = Suspension::All(vec![done.clone(), running.clone()]);
        assert!(wait.poll().is_pending());
        running.set_error(Error::saga("also done"));
        assert!(wait.poll().is_ready());
        assert!(!done.is_cancel_requested());
    }

    #[test]
    fn race_records_winner_and_cancels_losers() {
        let slow = TaskHandle::detached();
        let fast = finished();
        let winner = ReturnData::new();
        let mut wait: Suspension<()> = Suspension::Race {
            tasks: vec![slow.clone(), fast],
            winner: Some(winner.clone()),
        };
        assert!(wait.poll().is_ready());
        assert_eq!(winner.get(), Some(1));
        assert!(slow.is_cancel_requested());
        assert_eq!(slow.cancel_reason().map(|r| r.kind()), Some(CancelKind::RaceLost));
    }

    #[test]
    fn empty_all_is_ready() {
        let mut wait: Suspension<()> = Suspension::All(Vec::new());
        assert!(wait.poll().is_ready());
    }
}
