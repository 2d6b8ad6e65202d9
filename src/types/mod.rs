//! Core types for the saga runtime.
//!
//! - [`id`]: Task identifiers
//! - [`state`]: Task lifecycle states
//! - [`cancel`]: Cancellation reason and kind types
//! - [`return_data`]: Single-assignment result cells
//! - [`value`]: Type-erased positional arguments

pub mod cancel;
pub mod id;
pub mod return_data;
pub mod state;
pub mod value;

pub use cancel::{CancelKind, CancelReason};
pub use id::TaskId;
pub use return_data::ReturnData;
pub use state::TaskState;
pub use value::Value;
