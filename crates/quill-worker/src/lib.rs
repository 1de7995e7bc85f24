//! Background work for Quill.
//!
//! [`SweepRunner`] periodically runs the
//! [`StaleUploadSweeper`](quill_service::StaleUploadSweeper) until shutdown
//! is signalled.

pub mod runner;

pub use runner::SweepRunner;
