//! # quill-entity
//!
//! Domain entity models for the Quill upload pipeline. Every struct in this
//! crate represents a database table row or a creation payload. Row types
//! derive `sqlx::FromRow`; status enums map onto PostgreSQL enum types.

pub mod catalog;
pub mod upload;
