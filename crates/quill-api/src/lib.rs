//! # quill-api
//!
//! HTTP API layer for Quill built on Axum.
//!
//! Exposes the chunked upload protocol (`/file/verify`, `/file/chunk`,
//! `/file/merge`), a health check and static serving of merged files.
//! Every response, including failures, uses the `{code, data, message}`
//! envelope.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, run_server};
pub use error::ApiError;
pub use state::AppState;
