//! Collaborator interfaces: the store and the action stream.
//!
//! The runtime never owns application state. It reads snapshots and
//! dispatches actions through [`Store`], and it learns about dispatched
//! actions through an [`ActionStream`]. [`ActionChannel`] is the in-process
//! stream the middleware uses by default.

use crate::tracing_compat::trace;
use crate::types::ReturnData;
use core::fmt;
use parking_lot::Mutex;
use slab::Slab;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// A predicate over actions, shared between effects and subscriptions.
pub type Pattern<A> = Arc<dyn Fn(&A) -> bool + Send + Sync>;

/// The application store the sagas run against.
///
/// Implementations may be called from the scheduler thread and from host
/// threads dispatching actions, hence the `Send + Sync` bound.
pub trait Store<S, A>: Send + Sync {
    /// Returns a snapshot of the current state. Must not have side effects.
    fn get_state(&self) -> S;

    /// Applies `action` and returns whatever the dispatch chain returns.
    fn dispatch(&self, action: A) -> A;
}

/// A push-based stream of dispatched actions.
pub trait ActionStream<A>: Send + Sync {
    /// Delivers `action` to every subscription whose pattern matches it.
    fn publish(&self, action: &A);

    /// Registers a one-shot subscription for the next matching action.
    fn subscribe(&self, pattern: Pattern<A>) -> Subscription<A>;
}

/// A one-shot subscription to an [`ActionStream`].
///
/// The stream writes the first matching action into the subscription's
/// cell and forgets the subscription. Dropping the subscription before a
/// match unregisters it.
pub struct Subscription<A> {
    cell: ReturnData<A>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl<A> Subscription<A> {
    /// Creates a subscription fed through `cell`.
    ///
    /// `detach` runs once when the subscription is dropped and should
    /// unregister it from the stream.
    pub fn new<F>(cell: ReturnData<A>, detach: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cell,
            detach: Some(Box::new(detach)),
        }
    }

    /// Returns true once a matching action has been delivered.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        self.cell.is_set()
    }
}

impl<A: Clone> Subscription<A> {
    /// Returns the delivered action, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<A> {
        self.cell.get()
    }
}

impl<A> Drop for Subscription<A> {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl<A> fmt::Debug for Subscription<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("delivered", &self.is_delivered())
            .finish()
    }
}

struct Listener<A> {
    serial: u64,
    pattern: Pattern<A>,
    cell: ReturnData<A>,
}

struct ChannelInner<A> {
    listeners: Mutex<Slab<Listener<A>>>,
    next_serial: AtomicU64,
}

impl<A> ChannelInner<A> {
    fn remove(&self, key: usize, serial: u64) -> Option<ReturnData<A>> {
        let mut listeners = self.listeners.lock();
        let current = listeners.get(key).is_some_and(|l| l.serial == serial);
        current.then(|| listeners.remove(key).cell)
    }
}

/// An in-process [`ActionStream`].
///
/// Patterns are evaluated outside the listener lock, so a pattern may
/// itself inspect the channel. Clones share the same listeners.
pub struct ActionChannel<A> {
    inner: Arc<ChannelInner<A>>,
}

impl<A> ActionChannel<A> {
    /// Creates a channel with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                listeners: Mutex::new(Slab::new()),
                next_serial: AtomicU64::new(0),
            }),
        }
    }

    /// Number of subscriptions still waiting for a match.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl<A> Clone for ActionChannel<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> Default for ActionChannel<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for ActionChannel<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<A: Clone + Send + 'static> ActionStream<A> for ActionChannel<A> {
    fn publish(&self, action: &A) {
        let snapshot: SmallVec<[(usize, u64, Pattern<A>); 8]> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(key, l)| (key, l.serial, Arc::clone(&l.pattern)))
            .collect();

        let mut delivered = 0usize;
        for (key, serial, pattern) in snapshot {
            if !pattern(action) {
                continue;
            }
            // A concurrent unsubscribe or publish may have claimed it first.
            if let Some(cell) = self.inner.remove(key, serial) {
                cell.set(action.clone());
                delivered += 1;
            }
        }
        trace!(delivered, "action published");
    }

    fn subscribe(&self, pattern: Pattern<A>) -> Subscription<A> {
        let cell = ReturnData::new();
        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
        let key = self.inner.listeners.lock().insert(Listener {
            serial,
            pattern,
            cell: cell.clone(),
        });
        let weak: Weak<ChannelInner<A>> = Arc::downgrade(&self.inner);
        Subscription::new(cell, move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(key, serial);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Action {
        SetId(u32),
        Restart,
    }

    fn is_restart() -> Pattern<Action> {
        Arc::new(|a: &Action| matches!(a, Action::Restart))
    }

    #[test]
    fn publish_delivers_only_to_matching_subscribers() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("publish_delivers_only_to_matching_subscribers");
        let channel = ActionChannel::new();
        let sub = channel.subscribe(is_restart());

        channel.publish(&Action::SetId(1));
        crate::assert_with_log!(
            sub.try_recv().is_none(),
            "non-matching action ignored",
            None::<Action>,
            sub.try_recv()
        );

        channel.publish(&Action::Restart);
        crate::assert_with_log!(
            sub.try_recv() == Some(Action::Restart),
            "matching action delivered",
            Some(Action::Restart),
            sub.try_recv()
        );
        crate::assert_with_log!(
            channel.subscriber_count() == 0,
            "one-shot subscription is removed",
            0,
            channel.subscriber_count()
        );
        crate::test_complete!("publish_delivers_only_to_matching_subscribers");
    }

    #[test]
    fn subscription_receives_first_match_only() {
        let channel = ActionChannel::new();
        let sub = channel.subscribe(Arc::new(|_: &Action| true));
        channel.publish(&Action::SetId(1));
        channel.publish(&Action::SetId(2));
        assert_eq!(sub.try_recv(), Some(Action::SetId(1)));
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let channel: ActionChannel<Action> = ActionChannel::new();
        let sub = channel.subscribe(is_restart());
        assert_eq!(channel.subscriber_count(), 1);
        drop(sub);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn stale_detach_does_not_remove_new_listener() {
        let channel: ActionChannel<Action> = ActionChannel::new();
        let first = channel.subscribe(is_restart());
        channel.publish(&Action::Restart);
        // The slab slot is free again and reused by the next subscription.
        let second = channel.subscribe(is_restart());
        drop(first);
        assert_eq!(channel.subscriber_count(), 1);
        channel.publish(&Action::Restart);
        assert!(second.is_delivered());
    }
}
