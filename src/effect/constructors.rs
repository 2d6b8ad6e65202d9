//! Effect builders.
//!
//! Builders that take a result cell write into it when the runner
//! interprets the effect; the saga keeps a clone of the cell and reads it
//! after it is resumed.

use super::{
    CallEffect, CallFuture, CancelEffect, CombinatorEffect, Effect, ForkEffect, JoinEffect, PutEffect,
    SelectEffect, TakeEffect,
};
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::runtime::delay::Delay;
use crate::saga::{self, SagaFn, Yielded};
use crate::store::Pattern;
use crate::task::TaskHandle;
use crate::types::{ReturnData, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Wraps a predicate as a shareable action [`Pattern`].
pub fn pattern<A, F>(f: F) -> Pattern<A>
where
    F: Fn(&A) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Invokes external work and waits for it to finish.
///
/// `f` is called when the effect is interpreted, with `args` and the
/// task's cancellation token. An `Err` from the returned future fails the
/// task.
pub fn call<S, A, F, Fut>(args: Vec<Value>, f: F) -> Effect<S, A>
where
    S: 'static,
    A: 'static,
    F: FnOnce(Vec<Value>, CancellationToken) -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    Effect::Call(CallEffect::new(
        std::any::type_name::<F>(),
        args,
        Box::new(move |args: Vec<Value>, token: CancellationToken| -> CallFuture {
            Box::pin(f(args, token))
        }),
    ))
}

/// Like [`call`], writing the work's output into `result`.
pub fn call_with<S, A, T, F, Fut>(args: Vec<Value>, f: F, result: ReturnData<T>) -> Effect<S, A>
where
    S: 'static,
    A: 'static,
    T: 'static,
    F: FnOnce(Vec<Value>, CancellationToken) -> Fut + 'static,
    Fut: Future<Output = Result<T>> + 'static,
{
    Effect::Call(CallEffect::new(
        std::any::type_name::<F>(),
        args,
        Box::new(move |args: Vec<Value>, token: CancellationToken| -> CallFuture {
            let fut = f(args, token);
            Box::pin(async move {
                let value = fut.await?;
                result.set(value);
                Ok(())
            })
        }),
    ))
}

/// Waits for `duration` of wall-clock time.
///
/// The wait ends early, without error, if the task is cancelled.
#[must_use]
pub fn delay<S: 'static, A: 'static>(duration: Duration) -> Effect<S, A> {
    Effect::Call(CallEffect::new(
        "delay",
        Vec::new(),
        Box::new(move |_: Vec<Value>, token: CancellationToken| -> CallFuture {
            Box::pin(Delay::new(duration, token))
        }),
    ))
}

/// Parks the task for `ticks` scheduler ticks.
#[must_use]
pub fn delay_ticks<S: 'static, A: 'static>(ticks: usize) -> Yielded<S, A> {
    Yielded::Nested(saga::from_iter((0..ticks).map(|_| Yielded::Tick)))
}

/// Dispatches `action` through the middleware and into the store.
#[must_use]
pub const fn put<S, A>(action: A) -> Effect<S, A> {
    Effect::Put(PutEffect::new(action))
}

/// Waits for the next published action matching `pattern`.
pub fn take<S, A, F>(pattern: F) -> Effect<S, A>
where
    F: Fn(&A) -> bool + Send + Sync + 'static,
{
    Effect::Take(TakeEffect::new(Arc::new(pattern), None))
}

/// Like [`take`], writing the matched action into `result`.
pub fn take_with<S, A, F>(pattern: F, result: ReturnData<A>) -> Effect<S, A>
where
    F: Fn(&A) -> bool + Send + Sync + 'static,
{
    Effect::Take(TakeEffect::new(Arc::new(pattern), Some(result)))
}

/// Reads the current state through `selector` into `result`.
pub fn select<S, A, T, F>(selector: F, result: ReturnData<T>) -> Effect<S, A>
where
    S: 'static,
    A: 'static,
    T: 'static,
    F: FnOnce(&S) -> T + 'static,
{
    Effect::Select(SelectEffect::new(
        std::any::type_name::<F>(),
        Box::new(move |state: &S| {
            result.set(selector(state));
        }),
    ))
}

/// Like [`select`], passing `args` to the selector.
pub fn select_with<S, A, T, F>(selector: F, args: Vec<Value>, result: ReturnData<T>) -> Effect<S, A>
where
    S: 'static,
    A: 'static,
    T: 'static,
    F: FnOnce(&S, &[Value]) -> T + 'static,
{
    Effect::Select(SelectEffect::new(
        std::any::type_name::<F>(),
        Box::new(move |state: &S| {
            result.set(selector(state, &args));
        }),
    ))
}

/// Starts `saga(args)` as a child task without waiting for it.
#[must_use]
pub fn fork<S, A>(saga: SagaFn<S, A>, args: Vec<Value>) -> Effect<S, A> {
    Effect::Fork(ForkEffect::new(saga, args, None))
}

/// Like [`fork`], writing the child's handle into `result`.
#[must_use]
pub fn fork_with<S, A>(
    saga: SagaFn<S, A>,
    args: Vec<Value>,
    result: ReturnData<TaskHandle>,
) -> Effect<S, A> {
    Effect::Fork(ForkEffect::new(saga, args, Some(result)))
}

/// Waits until `task` is terminal. Never fails because of how it ended.
#[must_use]
pub const fn join<S, A>(task: TaskHandle) -> Effect<S, A> {
    Effect::Join(JoinEffect::new(task))
}

/// Requests cancellation of `task`.
#[must_use]
pub const fn cancel<S, A>(task: TaskHandle) -> Effect<S, A> {
    Effect::Cancel(CancelEffect::new(Some(task)))
}

/// Requests cancellation of the task performing the effect.
#[must_use]
pub const fn cancel_self<S, A>() -> Effect<S, A> {
    Effect::Cancel(CancelEffect::new(None))
}

/// Runs every effect as a child task and waits until all are terminal.
///
/// An empty list resolves immediately.
#[must_use]
pub const fn all<S, A>(effects: Vec<Effect<S, A>>) -> Effect<S, A> {
    Effect::All(CombinatorEffect::new(effects, None))
}

/// Runs every effect as a child task and resumes when the first one is
/// terminal, cancelling the rest.
///
/// # Errors
///
/// Returns `InvalidArgument` for an empty list, which could never resolve.
pub fn race<S, A>(effects: Vec<Effect<S, A>>) -> Result<Effect<S, A>> {
    if effects.is_empty() {
        return Err(Error::invalid_argument("race requires at least one effect"));
    }
    Ok(Effect::Race(CombinatorEffect::new(effects, None)))
}

/// Like [`race`], writing the index of the first finished effect into
/// `winner`.
///
/// # Errors
///
/// Returns `InvalidArgument` for an empty list.
pub fn race_with_winner<S, A>(
    effects: Vec<Effect<S, A>>,
    winner: ReturnData<usize>,
) -> Result<Effect<S, A>> {
    if effects.is_empty() {
        return Err(Error::invalid_argument("race requires at least one effect"));
    }
    Ok(Effect::Race(CombinatorEffect::new(effects, Some(winner))))
}
