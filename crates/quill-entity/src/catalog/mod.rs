//! Final file catalog entities.

pub mod file;

pub use file::{CatalogFile, CreateCatalogFile};
