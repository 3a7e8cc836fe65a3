//! Classified error types for store and codec operations.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ParseFailure,
    IoFailure,
    DuplicateIdentifier,
    ProtectedRecord,
    SerializationFailure,
    InvalidImport,
    InvalidRecord,
}

/// Failures raised by the strict frontmatter parser.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrontmatterError {
    #[error("missing frontmatter delimiter")]
    MissingDelimiter,

    #[error("malformed frontmatter metadata: {0}")]
    MalformedMetadata(String),
}

/// Errors surfaced by the file store and record stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: FrontmatterError,
    },

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record already exists: {0}")]
    DuplicateIdentifier(String),

    #[error("record is built-in and cannot be deleted: {0}")]
    Protected(String),

    #[error("failed to serialize record {id}: {message}")]
    Serialize { id: String, message: String },

    #[error("invalid import payload: {0}")]
    InvalidImport(String),

    #[error("invalid record {id}: {message}")]
    InvalidRecord { id: String, message: String },
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::NotFound(_) => ErrorCode::NotFound,
            StoreError::Parse { .. } => ErrorCode::ParseFailure,
            StoreError::Io { .. } => ErrorCode::IoFailure,
            StoreError::DuplicateIdentifier(_) => ErrorCode::DuplicateIdentifier,
            StoreError::Protected(_) => ErrorCode::ProtectedRecord,
            StoreError::Serialize { .. } => ErrorCode::SerializationFailure,
            StoreError::InvalidImport(_) => ErrorCode::InvalidImport,
            StoreError::InvalidRecord { .. } => ErrorCode::InvalidRecord,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.display().to_string())
        } else {
            StoreError::Io { path, source }
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: FrontmatterError) -> Self {
        StoreError::Parse {
            path: path.into(),
            source,
        }
    }

    /// True when the failure concerns a single file's content rather than
    /// the filesystem itself.
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, StoreError::Parse { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
