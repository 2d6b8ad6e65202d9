//! Test helpers: logging setup, phase macros, an in-memory store and a
//! bounded stepping loop.
//!
//! Compiled for unit tests and, through the `test-internals` feature, for
//! integration tests and doctests.

use crate::middleware::SagaMiddleware;
use crate::store::Store;
use parking_lot::Mutex;
use std::sync::Once;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

#[doc(hidden)]
pub use tracing as __tracing;

static INIT: Once = Once::new();

/// Installs a global test subscriber once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `debug`.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = init_subscriber("debug");
    });
}

fn init_subscriber(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let fmt_layer = fmt::layer()
        .pretty()
        .with_target(true)
        .with_level(true)
        .with_test_writer();
    tracing::subscriber::set_global_default(Registry::default().with(env_filter).with(fmt_layer))?;
    Ok(())
}

/// Logs the start of a test phase.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::test_utils::__tracing::info!(phase = %$name, "test phase started");
    };
}

/// Logs the end of a test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::test_utils::__tracing::info!(test = %$name, "test complete");
    };
}

/// Asserts `cond`, logging the expectation first and reporting both values
/// on failure.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr $(,)?) => {{
        let expected = &$expected;
        let actual = &$actual;
        $crate::test_utils::__tracing::debug!(
            check = %$msg,
            expected = ?expected,
            actual = ?actual,
            "assert"
        );
        assert!(
            $cond,
            "{}: expected {:?}, got {:?}",
            $msg,
            expected,
            actual
        );
    }};
}

/// In-memory store driven by a reducer closure.
///
/// Every dispatched action is recorded in order.
pub struct TestStore<S, A> {
    state: Mutex<S>,
    dispatched: Mutex<Vec<A>>,
    reducer: Box<dyn Fn(&S, &A) -> S + Send + Sync>,
}

impl<S, A> TestStore<S, A> {
    /// Creates a store holding `initial`, updated by `reducer` on every
    /// dispatch.
    pub fn new<F>(initial: S, reducer: F) -> Self
    where
        F: Fn(&S, &A) -> S + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(initial),
            dispatched: Mutex::new(Vec::new()),
            reducer: Box::new(reducer),
        }
    }
}

impl<S: Clone, A: Clone> TestStore<S, A> {
    /// The current state.
    pub fn state(&self) -> S {
        self.state.lock().clone()
    }

    /// Every action dispatched so far.
    pub fn dispatched(&self) -> Vec<A> {
        self.dispatched.lock().clone()
    }
}

impl<S, A> Store<S, A> for TestStore<S, A>
where
    S: Clone + Send,
    A: Clone + Send,
{
    fn get_state(&self) -> S {
        self.state.lock().clone()
    }

    fn dispatch(&self, action: A) -> A {
        {
            let mut state = self.state.lock();
            let next = (self.reducer)(&state, &action);
            *state = next;
        }
        self.dispatched.lock().push(action.clone());
        action
    }
}

/// Ticks `mw` until `done` holds, returning the number of ticks run.
///
/// # Panics
///
/// Panics with a runaway diagnostic if `done` still fails after
/// `max_ticks` ticks.
pub fn run_until<S, A, F>(mw: &mut SagaMiddleware<S, A>, max_ticks: usize, mut done: F) -> usize
where
    S: 'static,
    A: Clone + Send + 'static,
    F: FnMut(&SagaMiddleware<S, A>) -> bool,
{
    for ticks in 0..=max_ticks {
        if done(mw) {
            return ticks;
        }
        if ticks < max_ticks {
            mw.tick();
        }
    }
    panic!("runaway: condition not met after {max_ticks} ticks ({:?})", mw.stats());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_reduces_and_records() {
        init_test_logging();
        crate::test_phase!("test_store_reduces_and_records");
        let store = TestStore::new(1_i64, |s: &i64, a: &i64| s * a);
        store.dispatch(3);
        store.dispatch(4);
        crate::assert_with_log!(store.state() == 12, "reduced state", 12, store.state());
        assert_eq!(store.dispatched(), vec![3, 4]);
        assert_eq!(store.get_state(), 12);
        crate::test_complete!("test_store_reduces_and_records");
    }

    #[test]
    #[should_panic(expected = "runaway")]
    fn run_until_reports_runaway() {
        let store = std::sync::Arc::new(TestStore::new(0_u8, |s: &u8, _: &u8| *s));
        let mut mw = SagaMiddleware::<u8, u8>::new(store, crate::SchedulerConfig::default()).expect("config");
        run_until(&mut mw, 3, |_| false);
    }
}
