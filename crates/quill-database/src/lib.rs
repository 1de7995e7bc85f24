//! # quill-database
//!
//! Persistence for the upload pipeline: the PostgreSQL pool and migrations,
//! the [`UploadLedger`] and [`FileCatalog`] traits, and their PostgreSQL and
//! in-memory implementations.

pub mod connection;
pub mod ledger;
pub mod memory;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use ledger::{FileCatalog, UploadLedger};
pub use memory::{MemoryFileCatalog, MemoryUploadLedger};
pub use repositories::{PgFileCatalog, PgUploadLedger};
