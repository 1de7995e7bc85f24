//! Unified application error types for Quill.
//!
//! Infrastructure code maps its failures into [`AppError`]. The upload
//! protocol layers a typed taxonomy, [`UploadError`], on top so that every
//! failure mode has a distinct envelope code and retry classification.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// A conflict occurred (duplicate entry, concurrent modification, etc.).
    Conflict,
    /// An internal server error occurred.
    Internal,
    /// A database error occurred.
    Database,
    /// A storage I/O error occurred.
    Storage,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An external service error occurred.
    ExternalService,
    /// The service is temporarily unavailable.
    ServiceUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Database => write!(f, "DATABASE"),
            Self::Storage => write!(f, "STORAGE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::ExternalService => write!(f, "EXTERNAL_SERVICE"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
        }
    }
}

/// The unified infrastructure error used throughout Quill.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an external-service error.
    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalService, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Whether this error is a unique-key conflict.
    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }

    /// Whether this error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

/// Failure modes of the chunked upload protocol.
///
/// A request that arrives after the upload already finished is not an error;
/// it is reported through the `AlreadyComplete` outcomes of the service.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Missing or malformed request fields.
    #[error("{0}")]
    InvalidRequest(String),

    /// Merge requested for a hash with no live upload task.
    #[error("no upload task for hash {0}, verify the file first")]
    TaskNotFound(String),

    /// Merge requested before every chunk was uploaded.
    #[error("chunks incomplete: {uploaded}/{total} uploaded")]
    IncompleteChunks {
        /// Chunks recorded as uploaded.
        uploaded: u32,
        /// Chunks the task expects.
        total: u32,
    },

    /// The ledger names a chunk file that is absent from disk.
    #[error("chunk {index} is missing from storage ({path})")]
    ChunkMissing {
        /// Chunk index.
        index: u32,
        /// Storage path recorded for the chunk.
        path: String,
    },

    /// Writing or recording a chunk failed. The client should resend it.
    #[error("failed to persist chunk {index}: {source}")]
    ChunkPersistFailed {
        /// Chunk index.
        index: u32,
        /// Underlying failure.
        #[source]
        source: AppError,
    },

    /// Reassembly failed on every attempt. Chunks are left intact.
    #[error("merge failed after {attempts} attempt(s): {last}")]
    MergeFailed {
        /// Number of attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: Box<UploadError>,
    },

    /// Another request created the task for this hash concurrently.
    #[error("an upload task for hash {0} already exists")]
    DuplicateHash(String),

    /// The reassembled bytes do not hash to the claimed content hash.
    #[error("content hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch {
        /// Hash supplied by the client.
        expected: String,
        /// Hash of the merged bytes.
        actual: String,
    },

    /// Infrastructure failure.
    #[error(transparent)]
    Internal(#[from] AppError),
}

impl UploadError {
    /// Create an invalid-request error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Envelope code reported to the client.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::IncompleteChunks { .. } => 400,
            Self::TaskNotFound(_) | Self::ChunkMissing { .. } => 404,
            Self::DuplicateHash(_) => 409,
            Self::HashMismatch { .. } => 422,
            Self::ChunkPersistFailed { .. } | Self::MergeFailed { .. } => 500,
            Self::Internal(e) => match e.kind {
                ErrorKind::NotFound => 404,
                ErrorKind::Validation => 400,
                ErrorKind::Conflict => 409,
                ErrorKind::ServiceUnavailable => 503,
                _ => 500,
            },
        }
    }

    /// Whether a merge attempt that failed with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ChunkMissing { .. } => true,
            Self::Internal(e) => matches!(
                e.kind,
                ErrorKind::Storage | ErrorKind::Database | ErrorKind::Internal
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(UploadError::invalid("missing fileHash").code(), 400);
        assert_eq!(UploadError::TaskNotFound("abc".into()).code(), 404);
        assert_eq!(
            UploadError::IncompleteChunks {
                uploaded: 1,
                total: 3
            }
            .code(),
            400
        );
        assert_eq!(UploadError::DuplicateHash("abc".into()).code(), 409);
        assert_eq!(
            UploadError::Internal(AppError::storage("disk full")).code(),
            500
        );
        assert_eq!(
            UploadError::Internal(AppError::not_found("gone")).code(),
            404
        );
    }

    #[test]
    fn test_retry_classification() {
        assert!(
            UploadError::ChunkMissing {
                index: 2,
                path: "chunks/abc/2".into()
            }
            .is_retryable()
        );
        assert!(UploadError::Internal(AppError::database("timeout")).is_retryable());
        assert!(!UploadError::Internal(AppError::validation("bad")).is_retryable());
        assert!(
            !UploadError::HashMismatch {
                expected: "a".into(),
                actual: "b".into()
            }
            .is_retryable()
        );
        assert!(!UploadError::TaskNotFound("abc".into()).is_retryable());
    }

    #[test]
    fn test_merge_failed_message_includes_last_error() {
        let err = UploadError::MergeFailed {
            attempts: 3,
            last: Box::new(UploadError::ChunkMissing {
                index: 4,
                path: "chunks/abc/4".into(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempt"));
        assert!(msg.contains("chunk 4"));
    }
}
