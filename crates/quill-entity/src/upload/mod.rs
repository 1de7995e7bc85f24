//! Upload task and chunk entities.

pub mod chunk;
pub mod task;

pub use chunk::{ChunkRecord, ChunkStatus};
pub use task::{NewUploadTask, UploadStatus, UploadTask};
