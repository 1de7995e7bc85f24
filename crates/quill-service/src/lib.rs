//! # quill-service
//!
//! The upload coordinator. [`UploadService`] runs the chunked upload
//! protocol (verify, chunk intake, merge) over an
//! [`UploadLedger`](quill_database::UploadLedger), a
//! [`FileCatalog`](quill_database::FileCatalog) and the chunk store.
//! [`StaleUploadSweeper`] reclaims abandoned uploads.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod upload;

pub use upload::{
    ChunkAck, FileInfo, MergeOutcome, MergeRequest, StaleUploadSweeper, SweepReport,
    UploadService, UploadStatusReport, VerifyRequest, VerifyResult,
};
