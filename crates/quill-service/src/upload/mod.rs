//! Chunked upload protocol.

pub mod service;
pub mod sweeper;
pub mod types;

pub use service::UploadService;
pub use sweeper::{StaleUploadSweeper, SweepReport};
pub use types::{
    ChunkAck, FileInfo, MergeOutcome, MergeRequest, UploadStatusReport, VerifyRequest,
    VerifyResult,
};
