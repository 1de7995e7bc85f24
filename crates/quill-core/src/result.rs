//! Convenience result type aliases for Quill.

use crate::error::{AppError, UploadError};

/// A specialized `Result` type for infrastructure operations.
pub type AppResult<T> = Result<T, AppError>;

/// Result type for upload protocol operations.
pub type UploadResult<T> = Result<T, UploadError>;
