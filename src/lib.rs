//! Sagasync: saga middleware for Redux-style stores.
//!
//! # Overview
//!
//! A saga is a long-running flow of control written as a resumable state
//! machine that yields declarative [`Effect`](effect::Effect)s: call
//! external work, dispatch an action, wait for an action, read state, fork
//! a child task, join or cancel a task, or wait on all or the first of a set
//! of effects. The runtime interprets those effects against a host store and
//! drives every saga from a single, explicitly ticked scheduler.
//!
//! # Core Guarantees
//!
//! - **Structured tasks**: a forked task is a child of its forker; a parent
//!   only completes once its body and every child have finished
//! - **Monotonic outcomes**: `Completed`, `Canceled` and `Errored` are
//!   terminal and mutually exclusive
//! - **Cooperative cancellation**: cancellation is a request honoured at the
//!   task's next step, flows down the tree, and reaches `Call` work through a
//!   [`CancellationToken`]
//! - **Isolated failures**: an error or panic in one saga ends that task and
//!   never the scheduler
//! - **Deterministic stepping**: nothing runs outside [`SagaMiddleware::tick`];
//!   a task spawned during a tick first runs on the next one
//!
//! # Module Structure
//!
//! - [`types`]: identifiers, task states, cancel reasons, result cells
//! - [`saga`]: the [`Saga`](saga::Saga) trait and adapters
//! - [`effect`]: effect descriptions, constructors and the
//!   `take_every` / `take_latest` helpers
//! - [`task`]: task handles over the task tree
//! - [`runtime`]: the effect runner and the scheduler
//! - [`store`]: store and action-stream collaborators
//! - [`middleware`]: the Redux-facing facade
//! - [`config`]: scheduler configuration
//! - [`cancel`]: cancellation tokens handed to `Call` work
//! - [`error`](mod@error): error types
//! - [`tracing_compat`]: optional tracing integration (requires `tracing-integration` feature)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod cancel;
pub mod config;
pub mod effect;
pub mod error;
pub mod middleware;
pub mod runtime;
pub mod saga;
pub mod store;
pub mod task;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;
pub mod tracing_compat;
pub mod types;
pub mod util;

pub use cancel::CancellationToken;
pub use config::{ConfigError, SchedulerConfig};
pub use effect::{Effect, EffectKind};
pub use error::{Error, ErrorKind, Result};
pub use middleware::SagaMiddleware;
pub use runtime::{EffectRunner, Scheduler, SchedulerStats};
pub use saga::{BoxSaga, Saga, SagaFn, Step, Yielded};
pub use store::{ActionChannel, ActionStream, Pattern, Store, Subscription};
pub use task::TaskHandle;
pub use types::{CancelKind, CancelReason, ReturnData, TaskId, TaskState, Value};
