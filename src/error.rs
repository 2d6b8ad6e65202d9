//! Error types for the saga runtime.
//!
//! Every failure the runtime reports is an [`Error`]: a kind, an optional
//! human-readable context and an optional underlying source. Errors are
//! cheap to clone so one failure can be latched on a task and handed to
//! every observer of that task.

use core::fmt;
use std::sync::Arc;

/// Classification of runtime errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required argument was missing or malformed.
    InvalidArgument,
    /// An operation was configured or invoked incorrectly.
    InvalidOperation,
    /// The runtime was asked to do something it does not support.
    NotSupported,
    /// A saga body failed while being resumed.
    Saga,
    /// External work started by a `Call` effect failed.
    Call,
    /// Saga code panicked while its task was being stepped.
    Panicked,
    /// Forking would exceed the configured live-task limit.
    CapacityExceeded,
    /// Invalid runtime configuration.
    Config,
}

impl ErrorKind {
    /// Returns the kind name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid argument",
            Self::InvalidOperation => "invalid operation",
            Self::NotSupported => "not supported",
            Self::Saga => "saga failed",
            Self::Call => "call failed",
            Self::Panicked => "saga panicked",
            Self::CapacityExceeded => "task capacity exceeded",
            Self::Config => "invalid configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The runtime error type.
///
/// # Example
///
/// ```
/// use sagasync::error::{Error, ErrorKind};
///
/// let err = Error::invalid_argument("pattern").with_context("take_every argument 0");
/// assert_eq!(err.kind(), ErrorKind::InvalidArgument);
/// assert!(err.to_string().contains("take_every argument 0"));
/// ```
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Creates an error of the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// Creates an `InvalidArgument` error naming the offending parameter.
    #[must_use]
    pub fn invalid_argument(param: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument).with_context(param)
    }

    /// Creates an `InvalidOperation` error.
    #[must_use]
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOperation).with_context(msg)
    }

    /// Creates a `NotSupported` error.
    #[must_use]
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported).with_context(msg)
    }

    /// Creates a saga-body error.
    #[must_use]
    pub fn saga(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Saga).with_context(msg)
    }

    /// Creates an error for failed external `Call` work.
    #[must_use]
    pub fn call(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Call).with_context(msg)
    }

    /// Wraps an arbitrary error as failed `Call` work.
    #[must_use]
    pub fn from_call_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(ErrorKind::Call).with_source(err)
    }

    /// Adds context to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Attaches an underlying source error.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns true for programmer errors surfaced at construction time.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidArgument | ErrorKind::InvalidOperation | ErrorKind::Config
        )
    }

    /// Returns true for failures raised while a saga was running.
    #[must_use]
    pub const fn is_runtime_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Saga | ErrorKind::Call | ErrorKind::Panicked | ErrorKind::NotSupported
        )
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Error");
        dbg.field("kind", &self.kind);
        if let Some(ctx) = &self.context {
            dbg.field("context", ctx);
        }
        if let Some(source) = &self.source {
            dbg.field("source", &source.to_string());
        }
        dbg.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for runtime operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn error_kinds() {
        assert!(Error::invalid_argument("x").is_configuration_error());
        assert!(Error::invalid_operation("x").is_configuration_error());
        assert!(!Error::saga("x").is_configuration_error());
        assert!(Error::saga("x").is_runtime_error());
        assert!(Error::call("x").is_runtime_error());
        assert!(Error::new(ErrorKind::Panicked).is_runtime_error());
    }

    #[test]
    fn error_with_context() {
        let err = Error::invalid_operation("bad").with_context("argument 1");
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(err.context(), Some("argument 1"));
        let display = err.to_string();
        assert!(display.contains("invalid operation"));
        assert!(display.contains("argument 1"));
    }

    #[test]
    fn error_source_is_exposed() {
        let io = std::io::Error::other("disk on fire");
        let err = Error::from_call_error(io);
        assert_eq!(err.kind(), ErrorKind::Call);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("disk on fire"));
        let cloned = err.clone();
        assert!(format!("{cloned:?}").contains("disk on fire"));
    }
}
