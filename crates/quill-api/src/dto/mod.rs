//! Request and response bodies of the upload endpoints.

pub mod request;
pub mod response;

pub use request::{MergeBody, VerifyBody};
pub use response::{ChunkData, HealthData, MergeData, VerifyData};
