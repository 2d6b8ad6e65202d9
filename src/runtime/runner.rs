//! The effect interpreter.
//!
//! [`EffectRunner`] turns one [`Effect`] into either "keep going" or a
//! [`Suspension`] the task parks on. It owns the store and action-stream
//! collaborators; creating tasks is delegated to the scheduler through
//! [`Spawn`].

use super::stored_call::StoredCall;
use super::suspension::Suspension;
use crate::effect::Effect;
use crate::error::{Error, Result};
use crate::saga::{self, BoxSaga};
use crate::store::{ActionStream, Store};
use crate::task::TaskHandle;
use crate::tracing_compat::trace;
use crate::types::CancelReason;
use core::fmt;
use std::sync::Arc;

/// Result of interpreting one effect.
pub(crate) enum Outcome<A> {
    /// The effect finished synchronously; resume the saga.
    Continue,
    /// Park the task until the suspension resolves.
    Suspend(Suspension<A>),
}

/// Task creation, as seen by the runner.
pub(crate) trait Spawn<S, A> {
    /// Starts `saga` on a new task under `parent` (a root if `None`). The
    /// task first runs on the next tick.
    fn spawn(&mut self, saga: BoxSaga<S, A>, parent: Option<&TaskHandle>) -> Result<TaskHandle>;

    /// Returns true if `task` was issued by this scheduler.
    fn owns(&self, task: &TaskHandle) -> bool;
}

/// Interprets effects against the store and the action stream.
pub struct EffectRunner<S, A> {
    store: Arc<dyn Store<S, A>>,
    stream: Arc<dyn ActionStream<A>>,
}

impl<S: 'static, A: Clone + 'static> EffectRunner<S, A> {
    /// Creates a runner over the given collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn Store<S, A>>, stream: Arc<dyn ActionStream<A>>) -> Self {
        Self { store, stream }
    }

    /// The store collaborator.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store<S, A>> {
        &self.store
    }

    /// The action stream collaborator.
    #[must_use]
    pub fn action_stream(&self) -> &Arc<dyn ActionStream<A>> {
        &self.stream
    }

    /// Publishes `action` to the action stream, then forwards it to the
    /// store. `Put` and the middleware hook share this path.
    pub fn dispatch(&self, action: A) -> A {
        self.stream.publish(&action);
        self.store.dispatch(action)
    }

    pub(crate) fn interpret(
        &self,
        effect: Effect<S, A>,
        task: &TaskHandle,
        spawner: &mut dyn Spawn<S, A>,
    ) -> Result<Outcome<A>> {
        trace!(task = %task.id(), effect = %effect.kind(), "interpret effect");
        match effect {
            Effect::Call(call) => {
                let label = call.label();
                let future = call.start(task.cancellation_token());
                Ok(Outcome::Suspend(Suspension::Call(StoredCall::new(
                    label, future,
                ))))
            }
            Effect::Put(put) => {
                self.dispatch(put.into_action());
                Ok(Outcome::Continue)
            }
            Effect::Take(take) => {
                let (pattern, result) = take.into_parts();
                Ok(Outcome::Suspend(Suspension::Take {
                    subscription: self.stream.subscribe(pattern),
                    result,
                }))
            }
            Effect::Select(select) => {
                let state = self.store.get_state();
                select.apply(&state);
                Ok(Outcome::Continue)
            }
            Effect::Fork(fork) => {
                let (saga, args, result) = fork.into_parts();
                let child = spawner.spawn(saga(&args), Some(task))?;
                if let Some(result) = result {
                    result.set(child);
                }
                Ok(Outcome::Continue)
            }
            Effect::Join(join) => {
                let target = join.into_task();
                ensure_owned(spawner, &target, "join")?;
                if target == *task {
                    return Err(Error::invalid_operation("a task cannot join itself"));
                }
                Ok(Outcome::Suspend(Suspension::Join(target)))
            }
            Effect::Cancel(cancel) => {
                match cancel.into_target() {
                    Some(target) => {
                        ensure_owned(spawner, &target, "cancel")?;
                        target.cancel();
                    }
                    None => {
                        task.cancel();
                    }
                }
                Ok(Outcome::Continue)
            }
            Effect::All(all) => {
                let (effects, _) = all.into_parts();
                let tasks = spawn_children(effects, task, spawner)?;
                Ok(Outcome::Suspend(Suspension::All(tasks)))
            }
            Effect::Race(race) => {
                let (effects, winner) = race.into_parts();
                if effects.is_empty() {
                    return Err(Error::invalid_argument("race requires at least one effect"));
                }
                let tasks = spawn_children(effects, task, spawner)?;
                Ok(Outcome::Suspend(Suspension::Race { tasks, winner }))
            }
        }
    }
}

impl<S, A> fmt::Debug for EffectRunner<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRunner").finish_non_exhaustive()
    }
}

fn ensure_owned<S, A>(spawner: &dyn Spawn<S, A>, target: &TaskHandle, op: &str) -> Result<()> {
    if spawner.owns(target) {
        Ok(())
    } else {
        Err(Error::not_supported(format!(
            "cannot {op} task {} owned by another scheduler",
            target.id()
        )))
    }
}

/// Forks one child per sub-effect, in order. If any fork fails, children
/// already started are cancelled and the error is returned.
fn spawn_children<S: 'static, A: 'static>(
    effects: Vec<Effect<S, A>>,
    parent: &TaskHandle,
    spawner: &mut dyn Spawn<S, A>,
) -> Result<Vec<TaskHandle>> {
    let mut started = Vec::with_capacity(effects.len());
    for effect in effects {
        match spawner.spawn(saga::once(effect), Some(parent)) {
            Ok(child) => started.push(child),
            Err(err) => {
                for child in &started {
                    child.cancel_with(CancelReason::combinator_cleanup());
                }
                return Err(err);
            }
        }
    }
    Ok(started)
}
