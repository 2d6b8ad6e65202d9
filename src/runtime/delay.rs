use crate::cancel::CancellationToken;
use crate::error::Result;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Future behind the `delay` effect.
///
/// Stays pending, re-waking itself on every poll, until the deadline has
/// passed or the owning task's token is tripped.
pub struct Delay {
    deadline: Instant,
    token: CancellationToken,
}

impl Delay {
    /// Creates a delay of `duration` starting now.
    #[must_use]
    pub fn new(duration: Duration, token: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + duration,
            token,
        }
    }

    /// The instant the delay elapses.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Future for Delay {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.token.is_cancelled() || Instant::now() >= self.deadline {
            Poll::Ready(Ok(()))
        } else {
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
