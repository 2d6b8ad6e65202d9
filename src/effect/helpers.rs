//! `TakeEvery` and `TakeLatest` watchers.
//!
//! Both are small automata over primitive effects rather than new effect
//! kinds:
//!
//! ```text
//! TakeEvery:  Take ──▶ Fork ──▶ Take ──▶ ...
//! TakeLatest: Take ──▶ (Cancel previous if still running) ──▶ Fork ──▶ Take ──▶ ...
//! ```
//!
//! They never finish on their own; cancel the owning task to stop them.

use super::constructors::{cancel, fork, fork_with};
use super::{Effect, TakeEffect};
use crate::error::{Error, Result};
use crate::saga::{BoxSaga, Saga, SagaFn, Step};
use crate::store::Pattern;
use crate::task::TaskHandle;
use crate::types::{ReturnData, Value};
use core::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EveryPhase {
    Take,
    Fork,
}

/// Forks a worker for every matching action. Workers are never cancelled
/// by the watcher, so any number may be live at once.
pub struct TakeEvery<S, A> {
    pattern: Pattern<A>,
    worker: SagaFn<S, A>,
    args: Vec<Value>,
    phase: EveryPhase,
}

impl<S, A> TakeEvery<S, A> {
    /// Creates the watcher.
    #[must_use]
    pub const fn new(pattern: Pattern<A>, worker: SagaFn<S, A>, args: Vec<Value>) -> Self {
        Self {
            pattern,
            worker,
            args,
            phase: EveryPhase::Take,
        }
    }
}

impl<S, A> Saga<S, A> for TakeEvery<S, A> {
    fn resume(&mut self) -> Step<S, A> {
        match self.phase {
            EveryPhase::Take => {
                self.phase = EveryPhase::Fork;
                Step::effect(Effect::Take(TakeEffect::new(Arc::clone(&self.pattern), None)))
            }
            EveryPhase::Fork => {
                self.phase = EveryPhase::Take;
                Step::effect(fork(Arc::clone(&self.worker), self.args.clone()))
            }
        }
    }
}

impl<S, A> fmt::Debug for TakeEvery<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TakeEvery")
            .field("phase", &self.phase)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LatestPhase {
    Take,
    Decide,
    Fork,
}

/// Forks a worker for every matching action, cancelling the previous
/// worker first if it is still running. At most one worker is live.
pub struct TakeLatest<S, A> {
    pattern: Pattern<A>,
    worker: SagaFn<S, A>,
    args: Vec<Value>,
    last: Option<ReturnData<TaskHandle>>,
    phase: LatestPhase,
}

impl<S, A> TakeLatest<S, A> {
    /// Creates the watcher.
    #[must_use]
    pub const fn new(pattern: Pattern<A>, worker: SagaFn<S, A>, args: Vec<Value>) -> Self {
        Self {
            pattern,
            worker,
            args,
            last: None,
            phase: LatestPhase::Take,
        }
    }

    fn fork_next(&mut self) -> Step<S, A> {
        self.phase = LatestPhase::Take;
        let cell = ReturnData::new();
        self.last = Some(cell.clone());
        Step::effect(fork_with(Arc::clone(&self.worker), self.args.clone(), cell))
    }
}

impl<S, A> Saga<S, A> for TakeLatest<S, A> {
    fn resume(&mut self) -> Step<S, A> {
        match self.phase {
            LatestPhase::Take => {
                self.phase = LatestPhase::Decide;
                Step::effect(Effect::Take(TakeEffect::new(Arc::clone(&self.pattern), None)))
            }
            LatestPhase::Decide => {
                let running = self
                    .last
                    .as_ref()
                    .and_then(ReturnData::get)
                    .filter(|task| !task.is_terminal());
                match running {
                    Some(task) => {
                        self.phase = LatestPhase::Fork;
                        Step::effect(cancel(task))
                    }
                    None => self.fork_next(),
                }
            }
            LatestPhase::Fork => self.fork_next(),
        }
    }
}

impl<S, A> fmt::Debug for TakeLatest<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TakeLatest")
            .field("phase", &self.phase)
            .field("args", &self.args)
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

/// Builds a [`TakeEvery`] watcher saga.
pub fn take_every<S, A, F>(pattern: F, worker: SagaFn<S, A>, args: Vec<Value>) -> BoxSaga<S, A>
where
    S: 'static,
    A: 'static,
    F: Fn(&A) -> bool + Send + Sync + 'static,
{
    Box::new(TakeEvery::new(Arc::new(pattern), worker, args))
}

/// Builds a [`TakeLatest`] watcher saga.
pub fn take_latest<S, A, F>(pattern: F, worker: SagaFn<S, A>, args: Vec<Value>) -> BoxSaga<S, A>
where
    S: 'static,
    A: 'static,
    F: Fn(&A) -> bool + Send + Sync + 'static,
{
    Box::new(TakeLatest::new(Arc::new(pattern), worker, args))
}

/// Splits a positional `[pattern, worker, extra...]` argument array.
///
/// The pattern must be a [`Pattern<A>`] and the worker a [`SagaFn<S, A>`];
/// anything after them is passed to every forked worker.
fn split_helper_args<S, A>(
    helper: &str,
    args: &[Value],
) -> Result<(Pattern<A>, SagaFn<S, A>, Vec<Value>)>
where
    S: 'static,
    A: 'static,
{
    if args.len() < 2 {
        return Err(Error::invalid_operation(format!(
            "{helper} expects at least 2 arguments (pattern, worker), got {}",
            args.len()
        )));
    }
    let pattern = args[0].get::<Pattern<A>>().ok_or_else(|| {
        Error::invalid_operation(format!(
            "{helper} argument 0 must be a pattern `Fn(&A) -> bool`, got `{}`",
            args[0].type_name()
        ))
    })?;
    let worker = args[1].get::<SagaFn<S, A>>().ok_or_else(|| {
        Error::invalid_operation(format!(
            "{helper} argument 1 must be a saga factory, got `{}`",
            args[1].type_name()
        ))
    })?;
    Ok((pattern, worker, args[2..].to_vec()))
}

/// Builds a [`TakeEvery`] watcher from a dynamic argument array.
///
/// # Errors
///
/// Returns `InvalidOperation` naming the offending position and its actual
/// type when the array is too short or mistyped.
pub fn take_every_args<S: 'static, A: 'static>(args: &[Value]) -> Result<BoxSaga<S, A>> {
    let (pattern, worker, extra) = split_helper_args("take_every", args)?;
    Ok(Box::new(TakeEvery::new(pattern, worker, extra)))
}

/// Builds a [`TakeLatest`] watcher from a dynamic argument array.
///
/// # Errors
///
/// Returns `InvalidOperation` naming the offending position and its actual
/// type when the array is too short or mistyped.
pub fn take_latest_args<S: 'static, A: 'static>(args: &[Value]) -> Result<BoxSaga<S, A>> {
    let (pattern, worker, extra) = split_helper_args("take_latest", args)?;
    Ok(Box::new(TakeLatest::new(pattern, worker, extra)))
}
