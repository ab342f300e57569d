//! Domain-specific errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid line range {start}..={end}: start must be >= 0 and end >= start")]
    InvalidLineRange { start: i64, end: i64 },
}

/// Raised by a [`FileSource`](crate::infra::source::FileSource) when a file's text cannot be
/// produced at render time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("content unavailable for {path}: {reason}")]
pub struct ContentUnavailable {
    pub path: String,
    pub reason: String,
}

impl ContentUnavailable {
    /// Build an error for `path` with a human-readable reason.
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Error returned when parsing a user-facing `START[-END]` line range fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeParseError {
    #[error("line range '{0}' is not of the form START or START-END")]
    Malformed(String),
    #[error("line numbers start at 1, got {0}")]
    ZeroLine(i64),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}
