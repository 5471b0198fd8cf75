//! Top-level error type, composed from each component boundary's own error
//! enum via explicit `From` impls so a storage-layer "user absent" and a
//! schema-layer "user absent" collapse onto the same `NoemaError::UserAbsent`
//! the MCP layer maps to a single status.

use thiserror::Error;

use crate::embed::EmbedError;
use crate::extract::ExtractError;
use crate::generate::GenerateError;
use crate::storage::StorageError;
use crate::vector::VectorError;

#[derive(Debug, Error)]
pub enum NoemaError {
    #[error("invalid user id")]
    InvalidUserId,
    #[error("user does not exist")]
    UserAbsent,
    #[error("user already exists")]
    UserExists,
    #[error("content is empty after preprocessing")]
    EmptyContent,
    #[error("extraction failed: {0}")]
    ExtractFailed(String),
    #[error("embedding failed: {0}")]
    EmbedFailed(String),
    #[error("vector dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("backend unreachable")]
    ConnectFailed,
    #[error("operation timed out")]
    Timeout,
    #[error("per-user ingestion lock contended")]
    IngestBusy,
    #[error("vector index exists with an incompatible configuration")]
    ConflictingSchema,
    #[error("generation failed: {0}")]
    GenerateFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type NoemaResult<T> = Result<T, NoemaError>;

impl From<StorageError> for NoemaError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UserAbsent => NoemaError::UserAbsent,
            StorageError::ConnectFailed => NoemaError::ConnectFailed,
            other => NoemaError::Internal(other.to_string()),
        }
    }
}

impl From<VectorError> for NoemaError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::DimensionMismatch { expected, actual } => NoemaError::DimensionMismatch(
                format!("expected {expected}, got {actual}"),
            ),
            VectorError::ConflictingSchema => NoemaError::ConflictingSchema,
            VectorError::NodeAbsent => NoemaError::Internal("node absent in vector store".into()),
            VectorError::Backend(msg) => NoemaError::Internal(msg),
        }
    }
}

impl From<EmbedError> for NoemaError {
    fn from(err: EmbedError) -> Self {
        match err {
            EmbedError::EmbedFailed(msg) => NoemaError::EmbedFailed(msg),
        }
    }
}

impl From<ExtractError> for NoemaError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::ExtractFailed(msg) => NoemaError::ExtractFailed(msg),
        }
    }
}

impl From<GenerateError> for NoemaError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::GenerateFailed(msg) => NoemaError::GenerateFailed(msg),
        }
    }
}
