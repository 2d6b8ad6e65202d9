//! Internal utilities for the saga runtime.
//!
//! These utilities are intentionally minimal and dependency-free to keep
//! scheduling deterministic.

pub mod arena;

pub use arena::{Arena, ArenaIndex};
