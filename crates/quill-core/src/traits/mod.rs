//! Core traits defined in `quill-core` and implemented by other crates.

pub mod storage;

pub use storage::StorageProvider;
