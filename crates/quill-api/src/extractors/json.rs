//! `ValidatedJson` extractor: JSON body parsing plus `validator` checks,
//! with rejections rendered as envelope errors.

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::ApiError;

/// A JSON body that parsed and passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::invalid(rejection.body_text()))?;
        value
            .validate()
            .map_err(|errors| ApiError::invalid(validation_message(&errors)))?;
        Ok(Self(value))
    }
}

/// Field messages joined in a stable order.
fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .map(|e| {
            e.message
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| e.code.to_string())
        })
        .collect();
    if messages.is_empty() {
        return errors.to_string();
    }
    messages.sort();
    messages.join("; ")
}
