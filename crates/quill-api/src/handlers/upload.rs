//! Chunked upload handlers: verify, chunk, merge.

use axum::Json;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::HOST;
use bytes::Bytes;

use quill_core::types::ApiEnvelope;
use quill_service::{ChunkAck, MergeOutcome};

use crate::dto::request::parse_i64;
use crate::dto::{ChunkData, MergeBody, MergeData, VerifyBody, VerifyData};
use crate::error::ApiError;
use crate::extractors::{BearerToken, ValidatedJson};
use crate::state::AppState;

/// Multipart field carrying the chunk bytes.
pub const CHUNK_FIELD: &str = "chunk";

/// POST /file/verify
pub async fn verify(
    State(state): State<AppState>,
    bearer: BearerToken,
    ValidatedJson(body): ValidatedJson<VerifyBody>,
) -> Result<Json<ApiEnvelope<VerifyData>>, ApiError> {
    bearer.require(body.token.as_deref())?;

    let result = state.upload_service.verify(body.into_request()?).await?;
    let data = VerifyData::from(result);
    let message = if data.should_upload {
        "Upload required"
    } else {
        "File already exists"
    };
    Ok(Json(ApiEnvelope::ok(data, message)))
}

/// Fields of a chunk upload form.
#[derive(Debug, Default)]
struct ChunkForm {
    file_hash: Option<String>,
    chunk_index: Option<i64>,
    token: Option<String>,
    chunk: Option<Bytes>,
}

impl ChunkForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        let malformed = |e: MultipartError| {
            ApiError::invalid(format!("malformed multipart body: {}", e.body_text()))
        };

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                CHUNK_FIELD => form.chunk = Some(field.bytes().await.map_err(malformed)?),
                "fileHash" => form.file_hash = Some(field.text().await.map_err(malformed)?),
                "chunkIndex" => {
                    let text = field.text().await.map_err(malformed)?;
                    form.chunk_index = Some(parse_i64(&text).map_err(ApiError::invalid)?);
                }
                "token" => form.token = Some(field.text().await.map_err(malformed)?),
                _ => {}
            }
        }
        Ok(form)
    }
}

/// POST /file/chunk
pub async fn upload_chunk(
    State(state): State<AppState>,
    bearer: BearerToken,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiEnvelope<ChunkData>>, ApiError> {
    let multipart = multipart.map_err(|rejection| ApiError::invalid(rejection.body_text()))?;
    let form = ChunkForm::read(multipart).await?;
    bearer.require(form.token.as_deref())?;

    let hash = form
        .file_hash
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ApiError::invalid("fileHash is required"))?;
    let index = form
        .chunk_index
        .ok_or_else(|| ApiError::invalid("chunkIndex is required"))?;
    let chunk = form
        .chunk
        .ok_or_else(|| ApiError::invalid("no chunk data received"))?;

    let ack = state.upload_service.upload_chunk(&hash, index, chunk).await?;
    let message = match &ack {
        ChunkAck::Stored { .. } => "Chunk uploaded",
        ChunkAck::Duplicate { .. } => "Chunk already uploaded",
        ChunkAck::AlreadyComplete { .. } => "File already exists",
    };
    Ok(Json(ApiEnvelope::ok(ChunkData::from_ack(&hash, ack), message)))
}

/// POST /file/merge
pub async fn merge(
    State(state): State<AppState>,
    headers: HeaderMap,
    bearer: BearerToken,
    ValidatedJson(body): ValidatedJson<MergeBody>,
) -> Result<Json<ApiEnvelope<MergeData>>, ApiError> {
    bearer.require(body.token.as_deref())?;

    let request = body.into_request()?;
    let file_name = request.file_name.clone();
    let outcome = state.upload_service.merge(request).await?;

    let (data, message) = match outcome {
        MergeOutcome::Merged { file } => {
            let url = public_url(&state, &headers, &file.url);
            (MergeData::Merged { url, file_name }, "File merged")
        }
        MergeOutcome::AlreadyComplete { file } => (
            MergeData::Complete(VerifyData::complete(file)),
            "File already exists",
        ),
    };
    Ok(Json(ApiEnvelope::ok(data, message)))
}

/// Absolute URL for a `/uploads/<name>` path.
///
/// Uses `upload.public_base_url` when configured, otherwise the request's
/// `Host` header.
fn public_url(state: &AppState, headers: &HeaderMap, path: &str) -> String {
    if let Some(base) = state.config.upload.public_base_url.as_deref() {
        let name = path.trim_start_matches("/uploads/");
        return format!("{}/{}", base.trim_end_matches('/'), name);
    }
    match headers.get(HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{host}{path}"),
        None => path.to_string(),
    }
}
