//! Error types for the editing session.

use thiserror::Error;

use folio_layout::{ImportError, LayoutError};

/// The persistence boundary rejected a load or save.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// File or device error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be read back.
    #[error("stored document is malformed: {0}")]
    Format(#[from] ImportError),

    /// Document could not be serialized.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backend refused the operation.
    #[error("backend rejected save: {0}")]
    Rejected(String),
}

/// Errors surfaced by [`crate::EditorSession`].
///
/// A persistence failure never rolls back in-memory edits; the session keeps
/// reporting unsaved changes until a later save succeeds.
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    /// Import was rejected as a whole.
    #[error("import rejected: {0}")]
    Import(#[from] ImportError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("export failed: {0}")]
    Export(#[source] serde_json::Error),
}

impl EditorError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EditorError::Persistence(_))
    }
}

/// Result type for editor operations.
pub type Result<T> = std::result::Result<T, EditorError>;

/// Result type for backend operations.
pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;
