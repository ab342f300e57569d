//! Domain models for tracked selections.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::errors::DomainError;

/// Stable, cheaply clonable handle identifying a file in the workspace.
///
/// The handle never owns file content; identity is the path it was created from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileRef(Arc<Path>);

impl FileRef {
    /// Handle for `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(Arc::from(path.as_ref()))
    }

    /// Path the handle was created from.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for FileRef {
    fn from(value: PathBuf) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&Path> for FileRef {
    fn from(value: &Path) -> Self {
        Self::new(value)
    }
}

impl From<&str> for FileRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Inclusive, zero-based `(start, end)` pair of line indices.
///
/// Ordering is structural: by start, then by end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineRange {
    start: i64,
    end: i64,
}

impl LineRange {
    /// Legacy `(0, -1)` encoding of "entire file". Only [`SelectionKind::from_encoded`] gives it
    /// meaning; the store rejects it as a snippet range.
    pub const ENTIRE_FILE: LineRange = LineRange { start: 0, end: -1 };

    /// Build a validated range. Requires `start >= 0` and `end >= start`.
    pub fn new(start: i64, end: i64) -> Result<Self, DomainError> {
        if start < 0 || end < start {
            return Err(DomainError::InvalidLineRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// First line, zero-based.
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Last line, zero-based and inclusive.
    pub fn end(&self) -> i64 {
        self.end
    }

    /// Whether the range satisfies the `start >= 0 && end >= start` invariant.
    pub fn is_valid(&self) -> bool {
        self.start >= 0 && self.end >= self.start
    }

    /// Whether this is the [`LineRange::ENTIRE_FILE`] sentinel.
    pub fn is_entire_file(&self) -> bool {
        *self == Self::ENTIRE_FILE
    }

    /// Number of lines covered, 0 for an invalid range. Saturates at `usize::MAX`.
    pub fn line_count(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        usize::try_from(self.end.abs_diff(self.start))
            .map_or(usize::MAX, |span| span.saturating_add(1))
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// What part of a file a selection covers.
///
/// Variant order matters: whole-file selections sort before any snippet of the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SelectionKind {
    WholeFile,
    Snippet(LineRange),
}

impl SelectionKind {
    /// Decode the legacy range encoding where [`LineRange::ENTIRE_FILE`] stands for the whole file.
    pub fn from_encoded(range: LineRange) -> Self {
        if range.is_entire_file() {
            SelectionKind::WholeFile
        } else {
            SelectionKind::Snippet(range)
        }
    }

    /// Inverse of [`SelectionKind::from_encoded`].
    pub fn encoded(&self) -> LineRange {
        match self {
            SelectionKind::WholeFile => LineRange::ENTIRE_FILE,
            SelectionKind::Snippet(range) => *range,
        }
    }
}

/// One unit of tracked context: a whole file or a snippet of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionItem {
    pub file: FileRef,
    pub kind: SelectionKind,
}

impl SelectionItem {
    /// Whole-file selection of `file`.
    pub fn whole_file(file: impl Into<FileRef>) -> Self {
        Self {
            file: file.into(),
            kind: SelectionKind::WholeFile,
        }
    }

    /// Snippet selection of `range` within `file`.
    pub fn snippet(file: impl Into<FileRef>, range: LineRange) -> Self {
        Self {
            file: file.into(),
            kind: SelectionKind::Snippet(range),
        }
    }

    /// Whether the item covers a line range rather than the whole file.
    pub fn is_snippet(&self) -> bool {
        matches!(self.kind, SelectionKind::Snippet(_))
    }
}

impl fmt::Display for SelectionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SelectionKind::WholeFile => write!(f, "{}", self.file),
            SelectionKind::Snippet(range) => write!(f, "{} [{range}]", self.file),
        }
    }
}
