//! Load-time diagnostics
//!
//! Problems found while loading a sub-project are collected as
//! diagnostics instead of aborting the load. The caller decides whether
//! any of them is fatal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
        }
    }
}

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A file could not be read
    ReadFailed,
    /// A file is not valid JSON for its record type
    ParseFailed,
    /// A page record is malformed
    InvalidPage,
    /// Pages in a source file are unordered or overlapping
    PageOrder,
    /// The same page id occurs twice in the source data
    DuplicatePage,
    /// An annotation record is malformed
    InvalidAnnotation,
    /// The same page id occurs in two annotation files
    DuplicateAnnotation,
    /// Annotation without a page in the source data
    OrphanAnnotation,
    /// Page without an annotation; the page is not served
    UnannotatedPage,
    /// Annotation and page disagree on the audio file
    AudioMismatch,
    /// Annotation and page disagree on the page id
    IdMismatch,
    /// No pages were loaded
    NoPages,
    /// No annotations were loaded
    NoAnnotations,
    /// Legacy record was upgraded in memory
    Migrated,
    /// A whole sub-project failed to load
    LoadFailed,
}

/// A leveled diagnostic produced while loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: Level,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            kind,
            message: message.into(),
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            kind,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Whether any diagnostic in the list is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
