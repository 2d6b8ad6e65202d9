//! The Redux-facing facade.
//!
//! [`SagaMiddleware`] ties a store, an action stream and a [`Scheduler`]
//! together. The host installs [`SagaMiddleware::handle`] in its dispatch
//! chain, starts root sagas with [`SagaMiddleware::run`] and calls
//! [`SagaMiddleware::tick`] once per frame.
//!
//! ```
//! use sagasync::effect::{put, take_with};
//! use sagasync::saga;
//! use sagasync::test_utils::TestStore;
//! use sagasync::{ReturnData, SagaMiddleware, SchedulerConfig};
//! use std::sync::Arc;
//!
//! let store = Arc::new(TestStore::new(0_i32, |state: &i32, action: &i32| state + action));
//! let mut mw = SagaMiddleware::<i32, i32>::new(store.clone(), SchedulerConfig::default()).unwrap();
//!
//! let seen = ReturnData::new();
//! let task = mw
//!     .run(saga::from_iter([
//!         take_with(|a: &i32| *a > 10, seen.clone()).into(),
//!         put(1).into(),
//!     ]))
//!     .unwrap();
//! mw.tick();
//! mw.dispatch(42);
//! mw.tick();
//! assert!(task.is_completed());
//! assert_eq!(seen.value(), 42);
//! assert_eq!(store.state(), 43);
//! ```

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::runtime::{Scheduler, SchedulerStats};
use crate::saga::{BoxSaga, SagaFn};
use crate::store::{ActionChannel, ActionStream, Store};
use crate::task::TaskHandle;
use crate::tracing_compat::info;
use crate::types::Value;
use core::fmt;
use std::sync::Arc;

/// Saga middleware over a store with state `S` and actions `A`.
pub struct SagaMiddleware<S, A> {
    scheduler: Scheduler<S, A>,
}

impl<S: 'static, A: Clone + Send + 'static> SagaMiddleware<S, A> {
    /// Creates a middleware publishing to a fresh [`ActionChannel`].
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `config` does not validate.
    pub fn new(store: Arc<dyn Store<S, A>>, config: SchedulerConfig) -> Result<Self> {
        Self::with_stream(store, Arc::new(ActionChannel::new()), config)
    }

    /// Creates a middleware over a host-provided action stream.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `config` does not validate.
    pub fn with_stream(
        store: Arc<dyn Store<S, A>>,
        stream: Arc<dyn ActionStream<A>>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let scheduler = Scheduler::new(store, stream, config)?;
        info!(config = ?scheduler.config(), "saga middleware started");
        Ok(Self { scheduler })
    }

    /// Starts `saga` as a root task. It first runs on the next tick.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if the live task limit is reached.
    pub fn run(&mut self, saga: BoxSaga<S, A>) -> Result<TaskHandle> {
        self.scheduler.spawn(saga)
    }

    /// Starts a root task from a saga factory and its arguments.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if the live task limit is reached.
    pub fn run_fn(&mut self, saga: &SagaFn<S, A>, args: &[Value]) -> Result<TaskHandle> {
        self.scheduler.spawn(saga(args))
    }

    /// The dispatch hook: publishes `action` to the action stream, then
    /// hands it to `next`.
    pub fn handle<F>(&self, action: A, next: F) -> A
    where
        F: FnOnce(A) -> A,
    {
        self.scheduler.runner().action_stream().publish(&action);
        next(action)
    }

    /// Dispatches `action` through the hook into the store.
    pub fn dispatch(&self, action: A) -> A {
        self.scheduler.runner().dispatch(action)
    }

    /// Runs one scheduler tick.
    pub fn tick(&mut self) {
        self.scheduler.tick();
    }

    /// Requests cancellation of every live root task.
    pub fn shutdown(&mut self) -> usize {
        self.scheduler.shutdown()
    }

    /// Returns true when no task is left to run.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Scheduler counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// The action stream sagas take from.
    #[must_use]
    pub fn action_stream(&self) -> &Arc<dyn ActionStream<A>> {
        self.scheduler.runner().action_stream()
    }

    /// The store collaborator.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store<S, A>> {
        self.scheduler.runner().store()
    }
}

impl<S, A> fmt::Debug for SagaMiddleware<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaMiddleware")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
