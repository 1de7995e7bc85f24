//! # quill-core
//!
//! Core crate for the Quill upload pipeline. Contains configuration schemas,
//! the unified error system (including the upload error taxonomy), the
//! storage provider trait and the API response envelope.
//!
//! This crate has **no** internal dependencies on other Quill crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, UploadError};
pub use result::AppResult;
