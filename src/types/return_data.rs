//! Single-assignment result cells.
//!
//! A saga hands a [`ReturnData`] to an effect constructor and keeps a clone.
//! The runner writes the effect's result into the cell before the saga is
//! resumed, so the saga reads it on its next step.

use crate::tracing_compat::debug;
use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;

/// A shared cell written at most once and read any number of times.
///
/// The first write wins. Later writes are ignored and reported through the
/// return value of [`ReturnData::set`].
pub struct ReturnData<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> ReturnData<T> {
    /// Creates an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Writes the value if the cell is still empty.
    ///
    /// Returns `false` (and leaves the stored value untouched) if the cell
    /// was already assigned.
    pub fn set(&self, value: T) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            drop(slot);
            debug!(
                ty = std::any::type_name::<T>(),
                "ignoring second write to return data"
            );
            return false;
        }
        *slot = Some(value);
        true
    }

    /// Returns true once the cell has been assigned.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Returns true if both handles refer to the same cell.
    #[must_use]
    pub fn same_cell(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T: Clone> ReturnData<T> {
    /// Returns a clone of the assigned value, if any.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.slot.lock().clone()
    }
}

impl<T: Clone + Default> ReturnData<T> {
    /// Returns the assigned value, or `T::default()` before assignment.
    #[must_use]
    pub fn value(&self) -> T {
        self.get().unwrap_or_default()
    }
}

impl<T> Clone for ReturnData<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for ReturnData<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReturnData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnData")
            .field("value", &*self.slot.lock())
            .finish()
    }
}
