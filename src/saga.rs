//! The saga authoring surface.
//!
//! A saga is a resumable state machine. Each call to [`Saga::resume`]
//! advances it to its next suspension point and reports what it yielded:
//! an [`Effect`] for the runner to interpret, a nested saga to run to
//! completion in place, or an explicit one-tick yield. The runner writes
//! effect results into [`ReturnData`](crate::types::ReturnData) cells the
//! saga captured, so by the time `resume` is called again the previous
//! effect's result is readable.
//!
//! Most sagas are written with the adapters in this module rather than by
//! implementing the trait by hand:
//!
//! ```
//! use sagasync::effect;
//! use sagasync::saga::{self, BoxSaga, Yielded};
//! use sagasync::types::ReturnData;
//!
//! #[derive(Clone)]
//! struct State { id: u32 }
//!
//! #[derive(Clone, Debug)]
//! enum Action { Loaded(u32) }
//!
//! fn load() -> BoxSaga<State, Action> {
//!     let id = ReturnData::new();
//!     let read = id.clone();
//!     let mut stage = 0;
//!     saga::from_iter(std::iter::from_fn(move || {
//!         stage += 1;
//!         match stage {
//!             1 => Some(Yielded::from(effect::select(|s: &State| s.id, id.clone()))),
//!             2 => Some(Yielded::from(effect::put(Action::Loaded(read.value())))),
//!             _ => None,
//!         }
//!     }))
//! }
//! # let _ = load();
//! ```

use crate::effect::Effect;
use crate::error::Error;
use crate::types::Value;
use core::fmt;
use std::sync::Arc;

/// What a saga produced when resumed.
pub enum Yielded<S, A> {
    /// An effect for the runner to interpret.
    Effect(Effect<S, A>),
    /// A nested saga, run to completion before the outer saga resumes.
    Nested(BoxSaga<S, A>),
    /// Park the task until the next scheduler tick.
    Tick,
}

impl<S, A> From<Effect<S, A>> for Yielded<S, A> {
    fn from(effect: Effect<S, A>) -> Self {
        Self::Effect(effect)
    }
}

impl<S, A> fmt::Debug for Yielded<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Effect(effect) => f.debug_tuple("Effect").field(&effect.kind()).finish(),
            Self::Nested(_) => f.write_str("Nested(..)"),
            Self::Tick => f.write_str("Tick"),
        }
    }
}

/// Result of resuming a saga once.
pub enum Step<S, A> {
    /// The saga suspended on a yielded value.
    Yield(Yielded<S, A>),
    /// The saga body ran to completion.
    Done,
    /// The saga body failed.
    Faulted(Error),
}

impl<S, A> Step<S, A> {
    /// Shorthand for yielding an effect.
    #[must_use]
    pub const fn effect(effect: Effect<S, A>) -> Self {
        Self::Yield(Yielded::Effect(effect))
    }
}

impl<S, A> fmt::Debug for Step<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yield(y) => f.debug_tuple("Yield").field(y).finish(),
            Self::Done => f.write_str("Done"),
            Self::Faulted(err) => f.debug_tuple("Faulted").field(err).finish(),
        }
    }
}

/// A resumable saga body.
pub trait Saga<S, A> {
    /// Advances the saga to its next suspension point.
    fn resume(&mut self) -> Step<S, A>;

    /// Called when the owning task is cancelled before the body finished.
    ///
    /// Runs innermost-first across nested sagas, before any of them is
    /// dropped.
    fn on_cancel(&mut self) {}
}

/// An owned, type-erased saga.
pub type BoxSaga<S, A> = Box<dyn Saga<S, A>>;

/// A reusable saga factory taking positional arguments.
pub type SagaFn<S, A> = Arc<dyn Fn(&[Value]) -> BoxSaga<S, A> + Send + Sync>;

/// Wraps a closure as a [`SagaFn`].
pub fn saga_fn<S, A, F>(f: F) -> SagaFn<S, A>
where
    F: Fn(&[Value]) -> BoxSaga<S, A> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct IterSaga<I> {
    iter: I,
}

impl<S, A, I> Saga<S, A> for IterSaga<I>
where
    I: Iterator<Item = Yielded<S, A>>,
{
    fn resume(&mut self) -> Step<S, A> {
        self.iter.next().map_or(Step::Done, Step::Yield)
    }
}

/// Turns an iterator of yielded values into a saga.
///
/// The iterator is pulled lazily, one item per resumption, so closures
/// driving it can read the results of previously yielded effects.
pub fn from_iter<S, A, I>(iter: I) -> BoxSaga<S, A>
where
    I: IntoIterator<Item = Yielded<S, A>>,
    I::IntoIter: 'static,
    S: 'static,
    A: 'static,
{
    Box::new(IterSaga {
        iter: iter.into_iter(),
    })
}

struct TryIterSaga<I> {
    iter: I,
}

impl<S, A, I> Saga<S, A> for TryIterSaga<I>
where
    I: Iterator<Item = Result<Yielded<S, A>, Error>>,
{
    fn resume(&mut self) -> Step<S, A> {
        match self.iter.next() {
            Some(Ok(yielded)) => Step::Yield(yielded),
            Some(Err(err)) => Step::Faulted(err),
            None => Step::Done,
        }
    }
}

/// Like [`from_iter`], but an `Err` item faults the saga.
pub fn from_try_iter<S, A, I>(iter: I) -> BoxSaga<S, A>
where
    I: IntoIterator<Item = Result<Yielded<S, A>, Error>>,
    I::IntoIter: 'static,
    S: 'static,
    A: 'static,
{
    Box::new(TryIterSaga {
        iter: iter.into_iter(),
    })
}

struct FnSaga<F> {
    step: F,
    finished: bool,
}

impl<S, A, F> Saga<S, A> for FnSaga<F>
where
    F: FnMut() -> Step<S, A>,
{
    fn resume(&mut self) -> Step<S, A> {
        if self.finished {
            return Step::Done;
        }
        let step = (self.step)();
        if !matches!(step, Step::Yield(_)) {
            self.finished = true;
        }
        step
    }
}

/// Builds a saga from a closure returning one step per call.
///
/// Once the closure returns `Done` or `Faulted` it is not called again.
pub fn from_fn<S, A, F>(step: F) -> BoxSaga<S, A>
where
    F: FnMut() -> Step<S, A> + 'static,
    S: 'static,
    A: 'static,
{
    Box::new(FnSaga {
        step,
        finished: false,
    })
}

/// A saga that yields a single effect and finishes.
pub fn once<S: 'static, A: 'static>(effect: Effect<S, A>) -> BoxSaga<S, A> {
    from_iter(std::iter::once(Yielded::Effect(effect)))
}

/// A saga that finishes immediately.
pub fn empty<S: 'static, A: 'static>() -> BoxSaga<S, A> {
    from_iter(std::iter::empty())
}
