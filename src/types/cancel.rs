//! Cancellation reason and kind types.
//!
//! Cancellation is requested, never preemptive: a task records why it was
//! asked to stop and observes the request the next time it is resumed.

use core::fmt;

/// The kind of cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CancelKind {
    /// Explicit `Cancel` effect or host call.
    User,
    /// Cleanup issued by `All` after every child reached a terminal state.
    CombinatorCleanup,
    /// Cancellation due to losing a race (another branch finished first).
    RaceLost,
    /// The parent task was cancelled.
    ParentCancelled,
    /// The parent task errored.
    ParentErrored,
    /// The owning middleware is shutting down.
    Shutdown,
}

impl CancelKind {
    /// Returns the severity of this cancellation kind.
    ///
    /// Higher severity cancellations take precedence when strengthening.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::User => 0,
            Self::CombinatorCleanup | Self::RaceLost => 1,
            Self::ParentCancelled => 2,
            Self::ParentErrored => 3,
            Self::Shutdown => 4,
        }
    }
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::CombinatorCleanup => write!(f, "combinator cleanup"),
            Self::RaceLost => write!(f, "race lost"),
            Self::ParentCancelled => write!(f, "parent cancelled"),
            Self::ParentErrored => write!(f, "parent errored"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// The reason for a cancellation, including kind and optional context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelReason {
    /// The kind of cancellation.
    pub kind: CancelKind,
    /// Optional human-readable message.
    pub message: Option<&'static str>,
}

impl CancelReason {
    /// Creates a new cancellation reason with the given kind.
    #[must_use]
    pub const fn new(kind: CancelKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a user cancellation reason with a message.
    #[must_use]
    pub const fn user(message: &'static str) -> Self {
        Self {
            kind: CancelKind::User,
            message: Some(message),
        }
    }

    /// Creates a race loser cancellation reason.
    #[must_use]
    pub const fn race_lost() -> Self {
        Self::new(CancelKind::RaceLost)
    }

    /// Creates the reason `All` uses when it sweeps its finished children.
    #[must_use]
    pub const fn combinator_cleanup() -> Self {
        Self::new(CancelKind::CombinatorCleanup)
    }

    /// Creates a parent-cancelled cancellation reason.
    #[must_use]
    pub const fn parent_cancelled() -> Self {
        Self::new(CancelKind::ParentCancelled)
    }

    /// Creates a parent-errored cancellation reason.
    #[must_use]
    pub const fn parent_errored() -> Self {
        Self::new(CancelKind::ParentErrored)
    }

    /// Creates a shutdown cancellation reason.
    #[must_use]
    pub const fn shutdown() -> Self {
        Self::new(CancelKind::Shutdown)
    }

    /// Strengthens this reason with another, keeping the more severe one.
    ///
    /// Returns `true` if the reason was changed.
    pub fn strengthen(&mut self, other: &Self) -> bool {
        if other.kind.severity() > self.kind.severity() {
            self.kind = other.kind;
            self.message = other.message;
            return true;
        }

        if other.kind.severity() < self.kind.severity() {
            return false;
        }

        match (self.message, other.message) {
            (None, Some(msg)) => {
                self.message = Some(msg);
                true
            }
            _ => false,
        }
    }

    /// Returns true if this reason indicates shutdown.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self.kind, CancelKind::Shutdown)
    }

    /// Returns the kind of this cancellation reason.
    #[must_use]
    pub const fn kind(&self) -> CancelKind {
        self.kind
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        Self::new(CancelKind::User)
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    fn init_test(test_name: &str) {
        init_test_logging();
        crate::test_phase!(test_name);
    }

    #[test]
    fn severity_ordering() {
        init_test("severity_ordering");
        let ordered = [
            CancelKind::User,
            CancelKind::RaceLost,
            CancelKind::ParentCancelled,
            CancelKind::ParentErrored,
            CancelKind::Shutdown,
        ];
        for pair in ordered.windows(2) {
            let lower = pair[0].severity() < pair[1].severity();
            crate::assert_with_log!(lower, "severity should increase", true, lower);
        }
        crate::test_complete!("severity_ordering");
    }

    #[test]
    fn strengthen_takes_more_severe() {
        init_test("strengthen_takes_more_severe");
        let mut reason = CancelReason::user("stop");
        let strengthened = reason.strengthen(&CancelReason::parent_errored());
        crate::assert_with_log!(strengthened, "should strengthen", true, strengthened);
        crate::assert_with_log!(
            reason.kind == CancelKind::ParentErrored,
            "kind should be ParentErrored",
            CancelKind::ParentErrored,
            reason.kind
        );
        crate::assert_with_log!(
            reason.message.is_none(),
            "message follows the stronger reason",
            None::<&str>,
            reason.message
        );

        let unchanged = !reason.strengthen(&CancelReason::race_lost());
        crate::assert_with_log!(unchanged, "weaker reason is ignored", true, unchanged);
        crate::test_complete!("strengthen_takes_more_severe");
    }

    #[test]
    fn strengthen_fills_missing_message_at_equal_severity() {
        init_test("strengthen_fills_missing_message_at_equal_severity");
        let mut reason = CancelReason::new(CancelKind::User);
        let changed = reason.strengthen(&CancelReason::user("superseded"));
        crate::assert_with_log!(changed, "message should be adopted", true, changed);
        crate::assert_with_log!(
            reason.message == Some("superseded"),
            "message",
            Some("superseded"),
            reason.message
        );
        let again = reason.strengthen(&CancelReason::user("other"));
        crate::assert_with_log!(!again, "existing message kept", false, again);
        crate::test_complete!("strengthen_fills_missing_message_at_equal_severity");
    }

    #[test]
    fn display_includes_message() {
        init_test("display_includes_message");
        let text = CancelReason::user("superseded").to_string();
        crate::assert_with_log!(
            text == "user: superseded",
            "display",
            "user: superseded",
            text
        );
        crate::test_complete!("display_includes_message");
    }
}
