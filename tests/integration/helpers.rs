//! Shared test helpers for integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use md5::{Digest, Md5};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use quill_api::{AppState, build_app};
use quill_core::config::{AppConfig, DatabaseConfig};
use quill_database::{MemoryFileCatalog, MemoryUploadLedger};
use quill_storage::LocalStorageProvider;

const BOUNDARY: &str = "quill-test-boundary";

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// File catalog behind the router
    pub catalog: Arc<MemoryFileCatalog>,
    /// Uploads root, removed on drop
    pub dir: TempDir,
}

impl TestApp {
    /// Create a new test application over in-memory persistence and a
    /// temporary uploads root.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create uploads root");

        let mut config = test_config();
        config.upload.root = dir.path().to_string_lossy().to_string();

        let storage = Arc::new(
            LocalStorageProvider::new(dir.path())
                .await
                .expect("Failed to init storage"),
        );
        let catalog = Arc::new(MemoryFileCatalog::new());

        let state = AppState::new(
            config,
            Arc::new(MemoryUploadLedger::new()),
            catalog.clone(),
            storage,
        );

        Self {
            router: build_app(state),
            catalog,
            dir,
        }
    }

    /// POST a JSON body
    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .header("Host", "quill.test")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request");
        self.send(req).await
    }

    /// POST one chunk as `multipart/form-data`
    pub async fn post_chunk(
        &self,
        hash: &str,
        index: u32,
        token: Option<&str>,
        bytes: &[u8],
    ) -> TestResponse {
        let mut fields = vec![("fileHash", hash.to_string()), ("chunkIndex", index.to_string())];
        if let Some(token) = token {
            fields.push(("token", token.to_string()));
        }
        let req = Request::builder()
            .method("POST")
            .uri("/file/chunk")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(&fields, bytes)))
            .expect("Failed to build request");
        self.send(req).await
    }

    /// GET a path
    pub async fn get(&self, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024 * 1024)
            .await
            .expect("Failed to read body");
        (status, bytes.to_vec())
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}

impl TestResponse {
    /// The envelope `code`
    pub fn code(&self) -> u64 {
        self.body["code"].as_u64().unwrap_or_default()
    }

    /// The envelope `data`
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

/// Configuration with fast merge retries and the sweeper off.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig {
        server: Default::default(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 0,
            connect_timeout_seconds: 1,
            idle_timeout_seconds: 1,
            run_migrations: false,
        },
        upload: Default::default(),
        worker: Default::default(),
        logging: Default::default(),
    };
    config.upload.merge_retry_delay_ms = 10;
    config.worker.enabled = false;
    config
}

/// Lowercase hex MD5 of `data`
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

/// Deterministic test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn multipart_body(fields: &[(&str, String)], chunk: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"chunk\"; filename=\"blob\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(chunk);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
