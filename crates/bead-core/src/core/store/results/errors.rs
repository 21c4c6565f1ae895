use std::io;
use std::path::PathBuf;

use crate::core::tooling::diagnostics::results as codes;

/// Errors surfaced by the results cache.
#[derive(Debug, thiserror::Error)]
pub enum ResultsCacheError {
    #[error("[BRC101] results cache directory {} is unavailable: {reason}", .path.display())]
    DirectoryUnavailable { path: PathBuf, reason: String },
    #[error("[BRC201] invalid results cache identifier {id:?}: {reason}")]
    InvalidId { id: String, reason: &'static str },
    #[error("[BRC202] results cache identifier {id} is already in use")]
    IdInUse { id: String },
    #[error("[BRC203] results cache metadata for {expected} names a different entry ({found})")]
    IdMismatch { expected: String, found: String },
    #[error("[BRC301] failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("[BRC302] failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("[BRC303] results cache entry {id} not found")]
    NotFound { id: String },
    #[error("[BRC304] cursor failed while ingesting {id}")]
    Cursor {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("[BRC401] results cache chunk {} is corrupt: {error}", .path.display())]
    CorruptChunk { path: PathBuf, error: String },
    #[error("[BRC402] results cache metadata {} is corrupt: {error}", .path.display())]
    CorruptMetadata { path: PathBuf, error: String },
    #[error("[BRC501] row index {index} is out of range for {row_count} cached rows")]
    OutOfRange { index: i64, row_count: usize },
    #[error("[BRC502] results cache entry {id} is read-only")]
    ReadOnly { id: String },
    #[error("[BRC503] chunk size must hold at least one row")]
    InvalidChunkSize,
}

impl ResultsCacheError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DirectoryUnavailable { .. } => codes::DIRECTORY_UNAVAILABLE,
            Self::InvalidId { .. } => codes::INVALID_ID,
            Self::IdInUse { .. } => codes::ID_IN_USE,
            Self::IdMismatch { .. } => codes::ID_MISMATCH,
            Self::Write { .. } => codes::WRITE_FAILED,
            Self::Read { .. } => codes::READ_FAILED,
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::Cursor { .. } => codes::CURSOR_FAILED,
            Self::CorruptChunk { .. } => codes::CORRUPT_CHUNK,
            Self::CorruptMetadata { .. } => codes::CORRUPT_METADATA,
            Self::OutOfRange { .. } => codes::OUT_OF_RANGE,
            Self::ReadOnly { .. } => codes::READ_ONLY,
            Self::InvalidChunkSize => codes::INVALID_CHUNK_SIZE,
        }
    }

    /// Whether the caller asked for something invalid, as opposed to the
    /// cache or its storage failing.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidId { .. }
                | Self::IdInUse { .. }
                | Self::NotFound { .. }
                | Self::OutOfRange { .. }
                | Self::ReadOnly { .. }
                | Self::InvalidChunkSize
        )
    }

    pub(crate) fn directory(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DirectoryUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
