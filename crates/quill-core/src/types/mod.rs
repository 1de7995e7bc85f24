//! Core type definitions used across the Quill workspace.

pub mod response;

pub use response::ApiEnvelope;
