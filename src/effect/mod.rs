//! Effect descriptions.
//!
//! An [`Effect`] is data: it says what a saga wants done and carries the
//! cells the results should land in. Nothing happens until the runner
//! interprets it, which makes effect streams easy to inspect by stepping a
//! saga by hand.
//!
//! - [`constructors`]: the `call`, `put`, `take`, ... builders
//! - [`helpers`]: the `TakeEvery` / `TakeLatest` automata

pub mod constructors;
pub mod helpers;

pub use constructors::{
    all, call, call_with, cancel, cancel_self, delay, delay_ticks, fork, fork_with, join, pattern,
    put, race, race_with_winner, select, select_with, take, take_with,
};
pub use helpers::{TakeEvery, TakeLatest, take_every, take_every_args, take_latest, take_latest_args};

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::saga::SagaFn;
use crate::store::Pattern;
use crate::task::TaskHandle;
use crate::types::{ReturnData, Value};
use core::fmt;
use futures_lite::future::BoxedLocal;

/// Discriminator for [`Effect`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// Invoke external work.
    Call,
    /// Dispatch an action.
    Put,
    /// Wait for a matching action.
    Take,
    /// Read state.
    Select,
    /// Start a child task.
    Fork,
    /// Wait for a task to finish.
    Join,
    /// Request cancellation of a task.
    Cancel,
    /// Wait for every sub-effect.
    All,
    /// Wait for the first sub-effect.
    Race,
}

impl EffectKind {
    /// Returns the effect name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
            Self::Take => "take",
            Self::Select => "select",
            Self::Fork => "fork",
            Self::Join => "join",
            Self::Cancel => "cancel",
            Self::All => "all",
            Self::Race => "race",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single effect description.
pub enum Effect<S, A> {
    /// Invoke an awaitable unit of work.
    Call(CallEffect),
    /// Dispatch an action to the store.
    Put(PutEffect<A>),
    /// Suspend until a matching action is published.
    Take(TakeEffect<A>),
    /// Read the current state through a selector.
    Select(SelectEffect<S>),
    /// Start a child task.
    Fork(ForkEffect<S, A>),
    /// Suspend until a task is terminal.
    Join(JoinEffect),
    /// Request cancellation of a task.
    Cancel(CancelEffect),
    /// Run every sub-effect as a child task and wait for all of them.
    All(CombinatorEffect<S, A>),
    /// Run every sub-effect as a child task and wait for the first.
    Race(CombinatorEffect<S, A>),
}

impl<S, A> Effect<S, A> {
    /// Returns the effect discriminator.
    #[must_use]
    pub const fn kind(&self) -> EffectKind {
        match self {
            Self::Call(_) => EffectKind::Call,
            Self::Put(_) => EffectKind::Put,
            Self::Take(_) => EffectKind::Take,
            Self::Select(_) => EffectKind::Select,
            Self::Fork(_) => EffectKind::Fork,
            Self::Join(_) => EffectKind::Join,
            Self::Cancel(_) => EffectKind::Cancel,
            Self::All(_) => EffectKind::All,
            Self::Race(_) => EffectKind::Race,
        }
    }
}

impl<S, A: fmt::Debug> fmt::Debug for Effect<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call(e) => fmt::Debug::fmt(e, f),
            Self::Put(e) => fmt::Debug::fmt(e, f),
            Self::Take(e) => fmt::Debug::fmt(e, f),
            Self::Select(e) => fmt::Debug::fmt(e, f),
            Self::Fork(e) => fmt::Debug::fmt(e, f),
            Self::Join(e) => fmt::Debug::fmt(e, f),
            Self::Cancel(e) => fmt::Debug::fmt(e, f),
            Self::All(e) | Self::Race(e) => f
                .debug_struct(self.kind().as_str())
                .field("effects", &e.effects)
                .field("winner", &e.winner)
                .finish(),
        }
    }
}

/// The future a started `Call` hands back to the runner.
pub type CallFuture = BoxedLocal<Result<()>>;

type CallInvoke = Box<dyn FnOnce(Vec<Value>, CancellationToken) -> CallFuture>;

/// Payload of [`Effect::Call`].
pub struct CallEffect {
    label: &'static str,
    args: Vec<Value>,
    invoke: CallInvoke,
}

impl CallEffect {
    pub(crate) fn new(label: &'static str, args: Vec<Value>, invoke: CallInvoke) -> Self {
        Self {
            label,
            args,
            invoke,
        }
    }

    /// Name of the invoked function type.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Arguments the work will be invoked with.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Invokes the work, returning its future.
    pub(crate) fn start(self, token: CancellationToken) -> CallFuture {
        (self.invoke)(self.args, token)
    }
}

impl fmt::Debug for CallEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("call")
            .field("fn", &self.label)
            .field("args", &self.args)
            .finish()
    }
}

/// Payload of [`Effect::Put`].
pub struct PutEffect<A> {
    action: A,
}

impl<A> PutEffect<A> {
    pub(crate) const fn new(action: A) -> Self {
        Self { action }
    }

    /// The action to dispatch.
    #[must_use]
    pub const fn action(&self) -> &A {
        &self.action
    }

    pub(crate) fn into_action(self) -> A {
        self.action
    }
}

impl<A: fmt::Debug> fmt::Debug for PutEffect<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("put").field("action", &self.action).finish()
    }
}

/// Payload of [`Effect::Take`].
pub struct TakeEffect<A> {
    pattern: Pattern<A>,
    result: Option<ReturnData<A>>,
}

impl<A> TakeEffect<A> {
    pub(crate) const fn new(pattern: Pattern<A>, result: Option<ReturnData<A>>) -> Self {
        Self { pattern, result }
    }

    /// The predicate actions are matched against.
    #[must_use]
    pub const fn pattern(&self) -> &Pattern<A> {
        &self.pattern
    }

    /// Returns true if `action` satisfies the pattern.
    #[must_use]
    pub fn matches(&self, action: &A) -> bool {
        (self.pattern)(action)
    }

    /// Cell receiving the matched action, if requested.
    #[must_use]
    pub const fn result(&self) -> Option<&ReturnData<A>> {
        self.result.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Pattern<A>, Option<ReturnData<A>>) {
        (self.pattern, self.result)
    }
}

impl<A> fmt::Debug for TakeEffect<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("take")
            .field("has_result", &self.result.is_some())
            .finish_non_exhaustive()
    }
}

/// Payload of [`Effect::Select`].
///
/// The selector and its result cell are erased into one closure run against
/// a state snapshot.
pub struct SelectEffect<S> {
    label: &'static str,
    apply: Box<dyn FnOnce(&S)>,
}

impl<S> SelectEffect<S> {
    pub(crate) fn new(label: &'static str, apply: Box<dyn FnOnce(&S)>) -> Self {
        Self { label, apply }
    }

    /// Name of the selector type.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Runs the selector against `state` and stores its result.
    pub fn apply(self, state: &S) {
        (self.apply)(state);
    }
}

impl<S> fmt::Debug for SelectEffect<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("select")
            .field("selector", &self.label)
            .finish()
    }
}

/// Payload of [`Effect::Fork`].
pub struct ForkEffect<S, A> {
    saga: SagaFn<S, A>,
    args: Vec<Value>,
    result: Option<ReturnData<TaskHandle>>,
}

impl<S, A> ForkEffect<S, A> {
    pub(crate) fn new(
        saga: SagaFn<S, A>,
        args: Vec<Value>,
        result: Option<ReturnData<TaskHandle>>,
    ) -> Self {
        Self { saga, args, result }
    }

    /// The saga factory the child task will run.
    #[must_use]
    pub const fn saga(&self) -> &SagaFn<S, A> {
        &self.saga
    }

    /// Arguments passed to the saga factory.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Cell receiving the child's handle, if requested.
    #[must_use]
    pub const fn result(&self) -> Option<&ReturnData<TaskHandle>> {
        self.result.as_ref()
    }

    pub(crate) fn into_parts(self) -> (SagaFn<S, A>, Vec<Value>, Option<ReturnData<TaskHandle>>) {
        (self.saga, self.args, self.result)
    }
}

impl<S, A> fmt::Debug for ForkEffect<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("fork")
            .field("args", &self.args)
            .field("has_result", &self.result.is_some())
            .finish_non_exhaustive()
    }
}

/// Payload of [`Effect::Join`].
#[derive(Debug)]
pub struct JoinEffect {
    task: TaskHandle,
}

impl JoinEffect {
    pub(crate) const fn new(task: TaskHandle) -> Self {
        Self { task }
    }

    /// The task to wait for.
    #[must_use]
    pub const fn task(&self) -> &TaskHandle {
        &self.task
    }

    pub(crate) fn into_task(self) -> TaskHandle {
        self.task
    }
}

/// Payload of [`Effect::Cancel`].
#[derive(Debug)]
pub struct CancelEffect {
    target: Option<TaskHandle>,
}

impl CancelEffect {
    pub(crate) const fn new(target: Option<TaskHandle>) -> Self {
        Self { target }
    }

    /// The task to cancel; `None` means the task performing the effect.
    #[must_use]
    pub const fn target(&self) -> Option<&TaskHandle> {
        self.target.as_ref()
    }

    pub(crate) fn into_target(self) -> Option<TaskHandle> {
        self.target
    }
}

/// Payload of [`Effect::All`] and [`Effect::Race`].
///
/// Sub-effects are forked as child tasks in list order.
pub struct CombinatorEffect<S, A> {
    effects: Vec<Effect<S, A>>,
    winner: Option<ReturnData<usize>>,
}

impl<S, A> CombinatorEffect<S, A> {
    pub(crate) const fn new(effects: Vec<Effect<S, A>>, winner: Option<ReturnData<usize>>) -> Self {
        Self { effects, winner }
    }

    /// The sub-effects in creation order.
    #[must_use]
    pub fn effects(&self) -> &[Effect<S, A>] {
        &self.effects
    }

    /// Number of sub-effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Returns true if there are no sub-effects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Cell receiving the index of the first finished sub-effect (races only).
    #[must_use]
    pub const fn winner(&self) -> Option<&ReturnData<usize>> {
        self.winner.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Vec<Effect<S, A>>, Option<ReturnData<usize>>) {
        (self.effects, self.winner)
    }
}
