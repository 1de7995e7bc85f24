//! PostgreSQL implementations of the ledger and catalog traits.

pub mod catalog;
pub mod upload;

pub use catalog::PgFileCatalog;
pub use upload::PgUploadLedger;
