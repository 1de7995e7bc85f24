//! `BearerToken` extractor: the caller token from the `Authorization` header.
//!
//! Token validity is checked by the enclosing platform. Upload endpoints
//! only require that a non-empty token is present, either in the body or in
//! this header.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::ApiError;

/// Token from `Authorization: Bearer <token>` (or a bare header value).
#[derive(Debug, Clone, Default)]
pub struct BearerToken(pub Option<String>);

impl BearerToken {
    /// Require a token from the body or the header.
    pub fn require(&self, body_token: Option<&str>) -> Result<(), ApiError> {
        let present = body_token
            .into_iter()
            .chain(self.0.as_deref())
            .any(|t| !t.trim().is_empty());
        if present {
            Ok(())
        } else {
            Err(ApiError::invalid("token is required"))
        }
    }
}

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(Self(token))
    }
}
