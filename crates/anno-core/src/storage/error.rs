//! Store error handling
//!
//! Provides typed errors for store operations with descriptive messages
//! and recovery suggestions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::ClientId;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Page is locked by another client
    #[error("{page_id} is already locked by user {holder}")]
    AlreadyLocked { page_id: String, holder: ClientId },

    /// Unlock of a page that is not locked
    #[error("{page_id} is not locked")]
    NotLocked { page_id: String },

    /// Unlock of a page locked by someone else
    #[error("{page_id} is not locked by user {client}")]
    WrongOwner { page_id: String, client: ClientId },

    /// Client identity without a connection id
    #[error("empty connection id for client {0}")]
    EmptyClientId(ClientId),

    /// Client identity without a user name
    #[error("empty user name for client {0}")]
    EmptyUserName(ClientId),

    /// Annotation without a page id
    #[error("annotation has an empty page id")]
    EmptyPageId,

    /// Empty audio path given for lookup
    #[error("empty audio path")]
    EmptyAudioPath,

    /// No loaded sub-project with this name
    #[error("no such sub project '{0}'")]
    UnknownSubProject(String),

    /// Save of a page not known to the addressed sub-project
    #[error(
        "annotation '{}' doesn't exist in sub proj '{}'{}",
        .page_id,
        .sub_project,
        other_sub_project_hint(.other)
    )]
    NoSuchPage {
        page_id: String,
        sub_project: String,
        /// Another sub-project that does contain the page
        other: Option<String>,
    },

    /// Lookup of a page id not in the source data
    #[error("no page with id: {0}")]
    UnknownPage(String),

    /// Absolute request index that is not `first`, `last` or in bounds
    #[error("invalid request index: {index} ({pages} pages)")]
    InvalidRequestIndex { index: String, pages: usize },

    /// Transcription regex that does not compile
    #[error("invalid transcription regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Required directory is missing
    #[error("Directory does not exist: '{path}'")]
    MissingDirectory { path: PathBuf },

    /// Path exists but is not a directory
    #[error("Not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// Failed to create a directory
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write file
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to encode a record as JSON
    #[error("Failed to serialize '{path}': {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StoreError::PermissionDenied {
                path,
                source: error,
            },
            _ if is_disk_full_error(&error) => StoreError::DiskFull {
                path,
                source: error,
            },
            _ => StoreError::Write {
                path,
                source: error,
            },
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::DiskFull { .. } => Some("Free up disk space and try again."),
            StoreError::PermissionDenied { .. } => {
                Some("Check file and directory permissions. You may need to run with different permissions or change ownership.")
            }
            StoreError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StoreError::MissingDirectory { .. } => {
                Some("A sub-project needs a 'source' directory; 'annotation' is created on load.")
            }
            StoreError::NoSuchPage { other: Some(_), .. } => {
                Some("The client is addressing the wrong sub-project. Reload the page list.")
            }
            _ => None,
        }
    }
}

fn other_sub_project_hint(other: &Option<String>) -> String {
    match other {
        Some(name) => format!(". Annotation does exist in another sub proj, '{}'", name),
        None => String::new(),
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
