//! Saga execution.
//!
//! - [`scheduler`]: the tick loop and the active task list
//! - [`runner`]: effect interpretation against the store and action stream
//! - [`delay`]: the timer future behind the `delay` effect

pub mod delay;
mod runner;
mod scheduler;
mod stored_call;
mod suspension;

pub use delay::Delay;
pub use runner::EffectRunner;
pub use scheduler::{Scheduler, SchedulerStats};
