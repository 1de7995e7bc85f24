//! Chunked upload storage: chunk blobs, reassembly and cleanup.

pub mod assembler;
pub mod cleanup;
pub mod store;

pub use assembler::{AssembledFile, ChunkAssembler};
pub use cleanup::OrphanChunkCleanup;
pub use store::{ChunkLocation, ChunkStore, is_valid_content_hash};
