//! # quill-storage
//!
//! The uploads filesystem: a local [`StorageProvider`](quill_core::traits::StorageProvider)
//! implementation, the chunk store for in-flight uploads, the assembler that
//! merges chunks into final files, and orphan chunk cleanup.

pub mod chunked;
pub mod providers;

pub use chunked::{ChunkAssembler, ChunkLocation, ChunkStore, OrphanChunkCleanup};
pub use providers::LocalStorageProvider;
