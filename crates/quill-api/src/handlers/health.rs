//! Health check handler.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use quill_core::types::ApiEnvelope;

use crate::dto::HealthData;
use crate::state::AppState;

/// GET /health
///
/// 200 when the ledger and the uploads root both respond, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ApiEnvelope<HealthData>>) {
    let ledger = state.ledger.health_check().await.unwrap_or(false);
    let storage = state.storage.health_check().await.unwrap_or(false);
    let healthy = ledger && storage;

    let data = HealthData {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        ledger,
        storage,
    };

    if healthy {
        (StatusCode::OK, Json(ApiEnvelope::ok(data, "ok")))
    } else {
        tracing::warn!(ledger, storage, "Health check degraded");
        let envelope = ApiEnvelope {
            code: StatusCode::SERVICE_UNAVAILABLE.as_u16(),
            data: Some(data),
            message: Some("service degraded".to_string()),
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(envelope))
    }
}
