//! Stored `Call` work.
//!
//! `StoredCall` wraps the type-erased future a started `Call` effect
//! returned. The scheduler keeps it as the task's suspension and polls it
//! once per tick until it resolves.

use crate::effect::CallFuture;
use crate::error::Result;
use std::task::{Context, Poll, Waker};

/// A type-erased `Call` future parked on a task.
pub(crate) struct StoredCall {
    label: &'static str,
    future: CallFuture,
}

impl StoredCall {
    pub(crate) fn new(label: &'static str, future: CallFuture) -> Self {
        Self { label, future }
    }

    pub(crate) const fn label(&self) -> &'static str {
        self.label
    }

    /// Polls the work once.
    ///
    /// Ticks drive polling, so no waker is registered with anything that
    /// could reschedule the task early.
    pub(crate) fn poll(&mut self) -> Poll<Result<()>> {
        let mut cx = Context::from_waker(Waker::noop());
        self.future.as_mut().poll(&mut cx)
    }
}

impl std::fmt::Debug for StoredCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCall")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn stored_call_polls_to_completion() {
        let completed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&completed);
        let mut call = StoredCall::new(
            "set_flag",
            Box::pin(async move {
                flag.set(true);
                Ok(())
            }),
        );
        assert!(matches!(call.poll(), Poll::Ready(Ok(()))));
        assert!(completed.get());
    }

    #[test]
    fn stored_call_surfaces_errors() {
        let mut call = StoredCall::new("fails", Box::pin(async { Err(Error::call("refused")) }));
        match call.poll() {
            Poll::Ready(Err(err)) => assert_eq!(err.context(), Some("refused")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn pending_work_stays_pending() {
        let mut polls = 0;
        let mut call = StoredCall::new(
            "pending",
            Box::pin(futures_lite::future::poll_fn(move |_| {
                polls += 1;
                if polls < 3 { Poll::Pending } else { Poll::Ready(Ok(())) }
            })),
        );
        assert!(call.poll().is_pending());
        assert!(call.poll().is_pending());
        assert!(call.poll().is_ready());
        assert_eq!(call.label(), "pending");
        assert!(format!("{call:?}").contains("StoredCall"));
    }
}
