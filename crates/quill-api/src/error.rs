//! Maps upload failures to enveloped HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use quill_core::error::{AppError, UploadError};
use quill_core::types::ApiEnvelope;

/// Handler error. Rendered as HTTP 200 carrying `{code, message}`; clients
/// read the failure from `code`.
#[derive(Debug)]
pub struct ApiError(pub UploadError);

impl ApiError {
    /// A 400 error for a malformed request.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self(UploadError::invalid(message))
    }

    /// Envelope code for this error.
    pub fn code(&self) -> u16 {
        self.0.code()
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        Self(err)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(UploadError::Internal(err))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let message = self.0.to_string();

        if code >= 500 {
            tracing::error!(code, error = %message, "Upload request failed");
        } else {
            tracing::debug!(code, error = %message, "Upload request rejected");
        }

        let body: ApiEnvelope<()> = ApiEnvelope::error(code, message);
        (StatusCode::OK, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn envelope(err: ApiError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_failures_are_http_ok_with_code_in_envelope() {
        let cases = [
            (ApiError::invalid("fileHash is required"), 400),
            (ApiError::from(UploadError::TaskNotFound("h".into())), 404),
            (ApiError::from(UploadError::DuplicateHash("h".into())), 409),
            (ApiError::from(AppError::storage("disk full")), 500),
        ];
        for (err, code) in cases {
            let message = err.to_string();
            let (status, body) = envelope(err).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["code"], code);
            assert_eq!(body["message"], message);
            assert!(body.get("data").is_none());
        }
    }
}
