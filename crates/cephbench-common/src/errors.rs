//! Error types for cephbench.
//!
//! One error enum serves the whole workspace. The benchmark distinguishes
//! four behavioral classes of failure, and callers decide the class from the
//! variant:
//! - transient-ignorable: a snapshot capture timing out (logged, skipped)
//! - transient-blocking: a health query timing out inside a barrier
//!   (treated as "condition not yet satisfied")
//! - configuration: bad template, inconsistent OSD set, unsafe output dir
//!   (fatal before any work is done)
//! - critical-external: fio or a topology mutation failing (fatal)

use std::time::Duration;
use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Main error type for benchmark operations.
#[derive(Debug, Error)]
pub enum BenchError {
    /// An external command did not finish within its time budget.
    #[error("command timed out after {timeout:?}: {command}")]
    Timeout { command: String, timeout: Duration },

    /// An external command could not be spawned or was killed.
    #[error("command failed: {command} - {reason}")]
    CommandFailed { command: String, reason: String },

    /// An external command ran but exited abnormally.
    #[error("command exited with status {code:?}: {command}")]
    NonZeroExit { command: String, code: Option<i32> },

    /// Invalid input, options, or preconditions.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A workload template still contains a placeholder after rendering.
    #[error("unresolved placeholder {{{name}}} in workload template")]
    UnresolvedPlaceholder { name: String },

    /// External command output could not be interpreted.
    #[error("failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    /// An operation was requested in the wrong lifecycle state.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decode error (wraps serde_json::Error).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Creates a Timeout error.
    pub fn timeout(command: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            command: command.into(),
            timeout,
        }
    }

    /// Creates a CommandFailed error.
    pub fn command_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Creates a NonZeroExit error.
    pub fn non_zero_exit(command: impl Into<String>, code: Option<i32>) -> Self {
        Self::NonZeroExit {
            command: command.into(),
            code,
        }
    }

    /// Creates a Configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an UnresolvedPlaceholder error.
    pub fn unresolved_placeholder(name: impl Into<String>) -> Self {
        Self::UnresolvedPlaceholder { name: name.into() }
    }

    /// Creates a Parse error.
    pub fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Creates an InvalidState error.
    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// True for timeouts of bounded external calls.
    ///
    /// Barrier loops use this to tell "the cluster is slow to answer" apart
    /// from a genuinely broken command invocation, though both are handled
    /// conservatively.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True for errors that indicate operator-fixable input problems.
    ///
    /// These map to exit code 1 and are reported without a backtrace of
    /// external state.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::UnresolvedPlaceholder { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let err = BenchError::timeout("ceph status -f json", Duration::from_secs(10));
        assert!(matches!(err, BenchError::Timeout { .. }));
        assert!(err.is_timeout());
        assert!(err.to_string().contains("ceph status"));

        let err = BenchError::non_zero_exit("fio cfg.fio", Some(1));
        assert!(matches!(err, BenchError::NonZeroExit { code: Some(1), .. }));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(BenchError::configuration("output dir exists").is_configuration());
        assert!(BenchError::unresolved_placeholder("POOL").is_configuration());
        assert!(!BenchError::command_failed("fio", "spawn failed").is_configuration());
    }

    #[test]
    fn test_placeholder_message_names_placeholder() {
        let err = BenchError::unresolved_placeholder("BWLOGFILE");
        assert_eq!(
            err.to_string(),
            "unresolved placeholder {BWLOGFILE} in workload template"
        );
    }
}
