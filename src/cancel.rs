//! Cancellation signal handed to external `Call` work.
//!
//! Every task owns one [`CancellationToken`]. Requesting cancellation of the
//! task trips the token right away, so long-running work started by a `Call`
//! effect can stop promptly even though the task itself only observes the
//! request on its next resumption.

use core::fmt;
use parking_lot::Mutex;
use slab::Slab;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

struct TokenInner {
    cancelled: AtomicBool,
    waiters: Mutex<Slab<Waker>>,
}

/// A cloneable, thread-safe cancellation flag with async notification.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                waiters: Mutex::new(Slab::new()),
            }),
        }
    }

    /// Trips the token and wakes every pending [`Cancelled`] future.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let wakers: Vec<Waker> = self.inner.waiters.lock().drain().collect();
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Returns true once the token has been tripped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns a future that resolves once the token is tripped.
    #[must_use]
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            token: self.clone(),
            key: None,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Future returned by [`CancellationToken::cancelled`].
#[must_use = "futures do nothing unless polled"]
pub struct Cancelled {
    token: CancellationToken,
    key: Option<usize>,
}

impl Future for Cancelled {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.token.is_cancelled() {
            return Poll::Ready(());
        }
        let mut waiters = this.token.inner.waiters.lock();
        // Re-check under the lock: `cancel` drains after setting the flag.
        if this.token.is_cancelled() {
            return Poll::Ready(());
        }
        match this.key {
            Some(key) if waiters.contains(key) => {
                waiters[key].clone_from(cx.waker());
            }
            _ => {
                this.key = Some(waiters.insert(cx.waker().clone()));
            }
        }
        Poll::Pending
    }
}

impl Drop for Cancelled {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut waiters = self.token.inner.waiters.lock();
            if waiters.contains(key) {
                waiters.remove(key);
            }
        }
    }
}
