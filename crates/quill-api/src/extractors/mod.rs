//! Custom Axum extractors.

pub mod json;
pub mod token;

pub use json::ValidatedJson;
pub use token::BearerToken;
