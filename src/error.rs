//! Error taxonomy, diagnostics, and the result envelope returned by the
//! command invoker.

use crate::group_key::GroupKey;
use std::fmt;

/// Disposition of a completed (or short-circuited) invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    RanToCompletion,
    Faulted,
    Canceled,
    TimedOut,
    Rejected,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RanToCompletion => "RanToCompletion",
            Self::Faulted => "Faulted",
            Self::Canceled => "Canceled",
            Self::TimedOut => "TimedOut",
            Self::Rejected => "Rejected",
        };
        write!(f, "{s}")
    }
}

/// The value used for `TimeoutMillis` in [`Diagnostics`]: either an explicit
/// millisecond count, the literal `"Token"` (caller-supplied cancellation with
/// no numeric timeout), or the literal `"Ignored"` (global `ignoreTimeouts`
/// bypass).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutMillis {
    Millis(u64),
    Token,
    Ignored,
}

impl fmt::Display for TimeoutMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis(ms) => write!(f, "{ms}"),
            Self::Token => write!(f, "Token"),
            Self::Ignored => write!(f, "Ignored"),
        }
    }
}

/// Diagnostic bag attached to every non-`RanToCompletion` outcome (and,
/// for `invoke_async` callers who want it, to successful ones too).
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub command: String,
    pub status: CommandStatus,
    pub breaker_key: GroupKey,
    pub bulkhead_key: GroupKey,
    pub timeout_millis: TimeoutMillis,
    pub elapsed_millis: u64,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} status={} breaker={} bulkhead={} timeout={} elapsed={}ms",
            self.command,
            self.status,
            self.breaker_key,
            self.bulkhead_key,
            self.timeout_millis,
            self.elapsed_millis
        )
    }
}

/// The type-erased application error carried by `Faulted` and fallback
/// failures. The invoker is process-wide and spans heterogeneous commands, so
/// the inner error is boxed rather than carried as a generic parameter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type surfaced by the command invoker.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The command instance was invoked more than once. Always raised,
    /// ignoring `onFailure = Return`.
    #[error("command instance reused: {command} was already invoked")]
    CommandReused { command: String },

    /// A configuration value failed validation (e.g. a non-positive default
    /// timeout).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The circuit breaker for this key is not currently allowing calls.
    #[error("breaker rejected: {diagnostics}")]
    BreakerRejected { diagnostics: Diagnostics },

    /// The bulkhead for this key has no available capacity.
    #[error("bulkhead rejected: {diagnostics}")]
    BulkheadRejected { diagnostics: Diagnostics },

    /// The composed cancellation token fired because the timeout elapsed.
    #[error("timed out: {diagnostics}")]
    TimedOut { diagnostics: Diagnostics },

    /// The composed cancellation token fired because the caller canceled.
    #[error("canceled: {diagnostics}")]
    Canceled { diagnostics: Diagnostics },

    /// The command body returned an application error.
    #[error("faulted: {diagnostics}: {source}")]
    Faulted {
        diagnostics: Diagnostics,
        #[source]
        source: BoxError,
    },

    /// The fallback gate had no available capacity; the original failure is
    /// preserved as the cause.
    #[error("fallback rejected, original failure: {original}")]
    FallbackRejected {
        diagnostics: Diagnostics,
        #[source]
        original: Box<CoreError>,
    },

    /// The fallback function itself raised an error.
    #[error("fallback failed: {source}, original failure: {original}")]
    FallbackFailed {
        diagnostics: Diagnostics,
        #[source]
        source: BoxError,
        original: Box<CoreError>,
    },

    /// The command declared a fallback slot but no fallback function was
    /// supplied.
    #[error("fallback not implemented, original failure: {original}")]
    FallbackNotImplemented {
        diagnostics: Diagnostics,
        original: Box<CoreError>,
    },
}

impl CoreError {
    /// The diagnostics bag carried by every variant except [`Self::CommandReused`]
    /// and [`Self::InvalidConfig`], which precede admission and have none.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::CommandReused { .. } | Self::InvalidConfig(_) => None,
            Self::BreakerRejected { diagnostics }
            | Self::BulkheadRejected { diagnostics }
            | Self::TimedOut { diagnostics }
            | Self::Canceled { diagnostics }
            | Self::Faulted { diagnostics, .. }
            | Self::FallbackRejected { diagnostics, .. }
            | Self::FallbackFailed { diagnostics, .. }
            | Self::FallbackNotImplemented { diagnostics, .. } => Some(diagnostics),
        }
    }

    pub fn status(&self) -> CommandStatus {
        match self {
            Self::CommandReused { .. } | Self::InvalidConfig(_) => CommandStatus::Faulted,
            Self::BreakerRejected { .. } | Self::BulkheadRejected { .. } => CommandStatus::Rejected,
            Self::TimedOut { .. } => CommandStatus::TimedOut,
            Self::Canceled { .. } => CommandStatus::Canceled,
            Self::Faulted { .. }
            | Self::FallbackRejected { .. }
            | Self::FallbackFailed { .. }
            | Self::FallbackNotImplemented { .. } => CommandStatus::Faulted,
        }
    }

    pub fn is_breaker_rejected(&self) -> bool {
        matches!(self, Self::BreakerRejected { .. })
    }

    pub fn is_bulkhead_rejected(&self) -> bool {
        matches!(self, Self::BulkheadRejected { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }
}

/// The outcome handed back to the caller when `onFailure = Return`.
///
/// `value` is `None` unless `status == RanToCompletion`; Rust's `Option`
/// stands in for spec.md's "zero value of T".
#[derive(Debug)]
pub struct CommandResult<T> {
    pub status: CommandStatus,
    pub value: Option<T>,
    pub exception: Option<CoreError>,
}

impl<T> CommandResult<T> {
    pub fn success(value: T) -> Self {
        Self { status: CommandStatus::RanToCompletion, value: Some(value), exception: None }
    }

    pub fn failure(error: CoreError) -> Self {
        Self { status: error.status(), value: None, exception: Some(error) }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::RanToCompletion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(status: CommandStatus) -> Diagnostics {
        Diagnostics {
            command: "test.NoOp".into(),
            status,
            breaker_key: GroupKey::from("test"),
            bulkhead_key: GroupKey::from("test"),
            timeout_millis: TimeoutMillis::Millis(1000),
            elapsed_millis: 0,
        }
    }

    #[test]
    fn command_reused_ignores_on_failure_return_by_construction() {
        let err = CoreError::CommandReused { command: "test.NoOp".into() };
        assert_eq!(err.status(), CommandStatus::Faulted);
        assert!(err.diagnostics().is_none());
    }

    #[test]
    fn breaker_rejected_is_rejected_not_failure() {
        let err = CoreError::BreakerRejected { diagnostics: diag(CommandStatus::Rejected) };
        assert_eq!(err.status(), CommandStatus::Rejected);
        assert!(err.is_breaker_rejected());
    }

    #[test]
    fn timeout_millis_display_variants() {
        assert_eq!(TimeoutMillis::Millis(5).to_string(), "5");
        assert_eq!(TimeoutMillis::Token.to_string(), "Token");
        assert_eq!(TimeoutMillis::Ignored.to_string(), "Ignored");
    }

    #[test]
    fn command_result_success_has_no_exception() {
        let result: CommandResult<u32> = CommandResult::success(42);
        assert!(result.is_success());
        assert_eq!(result.value, Some(42));
        assert!(result.exception.is_none());
    }

    #[test]
    fn command_result_failure_has_zero_value() {
        let err = CoreError::TimedOut { diagnostics: diag(CommandStatus::TimedOut) };
        let result: CommandResult<u32> = CommandResult::failure(err);
        assert!(!result.is_success());
        assert_eq!(result.value, None);
        assert_eq!(result.status, CommandStatus::TimedOut);
    }
}
