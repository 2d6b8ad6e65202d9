//! Identifier types for runtime entities.
//!
//! Tasks are addressed by opaque handles; the identifier wraps an arena
//! index so stale identifiers never resolve to a newer task.

use crate::util::ArenaIndex;
use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::atomic::{AtomicU32, Ordering};

static DETACHED_TASK_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Generation used for tasks that live outside any scheduler.
const DETACHED_GENERATION: u32 = u32::MAX;

/// A unique identifier for a task in the runtime.
///
/// Tasks are units of structured concurrency owned by a scheduler.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) ArenaIndex);

impl TaskId {
    /// Creates a new task ID from an arena index (internal use).
    #[inline]
    #[must_use]
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    /// Returns the underlying arena index (internal use).
    #[inline]
    #[must_use]
    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates a task ID for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(index: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(index, generation))
    }

    /// Creates an ID for a task that is not registered with any scheduler.
    ///
    /// Detached IDs use a reserved generation so they never collide with
    /// arena-issued IDs.
    #[must_use]
    pub fn new_detached() -> Self {
        let index = DETACHED_TASK_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(ArenaIndex::new(index, DETACHED_GENERATION))
    }

    /// Returns true if this ID was issued outside a scheduler.
    #[must_use]
    pub const fn is_detached(self) -> bool {
        self.0.generation() == DETACHED_GENERATION
    }
}

impl fmt::Debug for TaskId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({}:{})", self.0.index(), self.0.generation())
    }
}

impl fmt::Display for TaskId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}.{}", self.0.index(), self.0.generation())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct SerdeArenaIndex {
    index: u32,
    generation: u32,
}

impl Serialize for TaskId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        SerdeArenaIndex {
            index: self.0.index(),
            generation: self.0.generation(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let idx = SerdeArenaIndex::deserialize(deserializer)?;
        Ok(Self(ArenaIndex::new(idx.index, idx.generation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_debug_format() {
        let id = TaskId::new_for_test(5, 3);
        let dbg = format!("{id:?}");
        assert!(dbg.contains("TaskId"), "{dbg}");
        assert!(dbg.contains('5'), "{dbg}");
        assert!(dbg.contains('3'), "{dbg}");
    }

    #[test]
    fn task_id_display_format() {
        let id = TaskId::new_for_test(7, 0);
        assert_eq!(format!("{id}"), "T7.0");
    }

    #[test]
    fn display_tells_reused_slots_apart() {
        let first = TaskId::new_for_test(3, 1);
        let reused = TaskId::new_for_test(3, 2);
        assert_eq!(first.to_string(), "T3.1");
        assert_ne!(first.to_string(), reused.to_string());
    }

    #[test]
    fn detached_ids_are_unique_and_flagged() {
        let a = TaskId::new_detached();
        let b = TaskId::new_detached();
        assert_ne!(a, b);
        assert!(a.is_detached());
        assert!(!TaskId::new_for_test(0, 0).is_detached());
    }

    #[test]
    fn arena_round_trip() {
        let idx = ArenaIndex::new(4, 2);
        let id = TaskId::from_arena(idx);
        assert_eq!(id.arena_index(), idx);
    }
}
