//! Envelope for timed-out requests.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use quill_core::types::ApiEnvelope;

/// Rewrites the bare 408 produced by `TimeoutLayer` into `{code: 408, message}`.
///
/// Must be layered outside the timeout layer.
pub async fn envelope_timeout(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    warn!("Request timed out");
    let body: ApiEnvelope<()> = ApiEnvelope::error(
        StatusCode::REQUEST_TIMEOUT.as_u16(),
        "request timed out",
    );
    (StatusCode::OK, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware::map_response;
    use axum::routing::get;
    use tower::ServiceExt;
    use tower_http::timeout::TimeoutLayer;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .route("/fast", get(|| async { "done" }))
            .layer(TimeoutLayer::new(Duration::from_millis(20)))
            .layer(map_response(envelope_timeout))
    }

    async fn call(path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let res = app().oneshot(req).await.unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), 64 * 1024).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_timeout_is_enveloped() {
        let (status, body) = call("/slow").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], 408);
        assert_eq!(json["message"], "request timed out");
    }

    #[tokio::test]
    async fn test_other_responses_pass_through() {
        let (status, body) = call("/fast").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"done");
    }
}
