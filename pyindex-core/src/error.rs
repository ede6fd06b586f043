//! # Engine Error Types
//!
//! Every failure in the engine is returned as a typed value; nothing in this
//! crate logs or retries. The surrounding layer decides how each kind is
//! presented to clients.
//!
//! - [`ParseError`]: a filename or version that cannot be ordered. Non-fatal,
//!   carried inside listing entries.
//! - [`StoreError`]: failures of the on-disk [`FileStore`](crate::store::FileStore).
//! - [`IndexError`]: failures of the [`IndexEngine`](crate::engine::IndexEngine),
//!   a superset of [`StoreError`].
//! - [`RenderError`]: template rendering failures.

use crate::normalize::NormalizedName;

/// A distribution filename or version string that does not match the
/// expected grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported distribution file type: {0}")]
    UnsupportedExtension(String),

    #[error("malformed distribution filename: {0}")]
    MalformedFilename(String),

    #[error("invalid version: {0}")]
    InvalidVersion(String),
}

/// Errors raised by the file store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid filename '{filename}': {reason}")]
    InvalidFilename { filename: String, reason: String },

    #[error("invalid project name '{0}'")]
    InvalidProjectName(String),

    #[error("{project}/{filename} already exists")]
    AlreadyExists {
        project: NormalizedName,
        filename: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the index engine.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid filename '{filename}': {reason}")]
    InvalidFilename { filename: String, reason: String },

    #[error("invalid project name '{0}'")]
    InvalidProjectName(String),

    #[error("filename belongs to project '{found}', not '{project}'")]
    NameMismatch {
        project: NormalizedName,
        found: NormalizedName,
    },

    #[error("{project}/{filename} already exists")]
    AlreadyExists {
        project: NormalizedName,
        filename: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(std::io::Error),
}

impl From<StoreError> for IndexError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidFilename { filename, reason } => {
                IndexError::InvalidFilename { filename, reason }
            }
            StoreError::InvalidProjectName(name) => IndexError::InvalidProjectName(name),
            StoreError::AlreadyExists { project, filename } => {
                IndexError::AlreadyExists { project, filename }
            }
            StoreError::NotFound(key) => IndexError::NotFound(key),
            StoreError::Io(e) => IndexError::Io(e),
        }
    }
}

/// A listing page could not be rendered.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template render error: {0}")]
    Template(#[from] askama::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type IndexResult<T> = Result<T, IndexError>;
