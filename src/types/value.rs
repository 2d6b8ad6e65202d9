//! Type-erased saga arguments.
//!
//! `Fork`, `Call` and the take helpers accept positional argument arrays.
//! Each argument is a [`Value`]: a shared, immutable, type-erased payload
//! that remembers the name of its concrete type for diagnostics.

use core::fmt;
use std::any::Any;
use std::sync::Arc;

/// A shared, type-erased argument value.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wraps a value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns the concrete type name captured at construction.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrows the value as `T` if that is its concrete type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Returns true if the concrete type is `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Returns a clone of the value as `T`.
    #[must_use]
    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Builds a `Vec<Value>` from a list of expressions.
///
/// ```
/// let args = sagasync::args![1_u32, "name"];
/// assert_eq!(args.len(), 2);
/// assert_eq!(args[0].get::<u32>(), Some(1));
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::types::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::types::Value::new($arg)),+]
    };
}
