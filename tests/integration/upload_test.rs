//! Integration tests for the chunked upload endpoints.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use helpers::{TestApp, md5_hex, payload};

const CHUNK: usize = 1024;
const TOKEN: &str = "test-token";

fn verify_body(hash: &str, name: &str, size: usize) -> serde_json::Value {
    json!({
        "fileHash": hash,
        "fileName": name,
        "size": size,
        "chunkSize": CHUNK,
        "token": TOKEN,
    })
}

fn merge_body(hash: &str, name: &str, size: usize) -> serde_json::Value {
    json!({
        "fileHash": hash,
        "fileName": name,
        "size": size,
        "token": TOKEN,
    })
}

async fn upload_all(app: &TestApp, hash: &str, data: &[u8], order: &[u32]) {
    for &index in order {
        let start = index as usize * CHUNK;
        let end = (start + CHUNK).min(data.len());
        let res = app.post_chunk(hash, index, Some(TOKEN), &data[start..end]).await;
        assert_eq!(res.status, StatusCode::OK, "chunk {index}: {:?}", res.body);
    }
}

#[tokio::test]
async fn test_full_upload_out_of_order() {
    let app = TestApp::new().await;
    let data = payload(5 * CHUNK / 2);
    let hash = md5_hex(&data);

    let res = app
        .post_json("/file/verify", verify_body(&hash, "clip.mp4", data.len()))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.code(), 200);
    assert_eq!(res.data()["shouldUpload"], true);
    assert_eq!(res.data()["chunkCount"], 3);
    assert_eq!(res.data()["uploadedList"], json!([]));

    upload_all(&app, &hash, &data, &[2, 0, 1]).await;

    let res = app
        .post_json("/file/merge", merge_body(&hash, "clip.mp4", data.len()))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    assert_eq!(res.data()["fileName"], "clip.mp4");
    let url = res.data()["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("http://quill.test/uploads/"), "{url}");
    assert!(url.ends_with(".mp4"));
    assert_eq!(app.catalog.len().await, 1);

    let path = url.trim_start_matches("http://quill.test");
    let (status, served) = app.get(path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served, data);
}

#[tokio::test]
async fn test_verify_after_merge_deduplicates() {
    let app = TestApp::new().await;
    let data = payload(CHUNK + 10);
    let hash = md5_hex(&data);

    app.post_json("/file/verify", verify_body(&hash, "a.bin", data.len()))
        .await;
    upload_all(&app, &hash, &data, &[0, 1]).await;
    app.post_json("/file/merge", merge_body(&hash, "a.bin", data.len()))
        .await;

    let res = app
        .post_json("/file/verify", verify_body(&hash, "copy.bin", data.len()))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["shouldUpload"], false);
    assert_eq!(res.data()["file"]["file_name"], "a.bin");
    assert!(res.data().get("uploadedList").is_none());

    // A late chunk is acknowledged without being stored.
    let res = app.post_chunk(&hash, 0, Some(TOKEN), &data[..CHUNK]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["shouldUpload"], false);

    // Merging again reports the existing file.
    let res = app
        .post_json("/file/merge", merge_body(&hash, "a.bin", data.len()))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["shouldUpload"], false);
    assert_eq!(app.catalog.len().await, 1);
}

#[tokio::test]
async fn test_resume_lists_uploaded_chunks() {
    let app = TestApp::new().await;
    let data = payload(4 * CHUNK);
    let hash = md5_hex(&data);

    app.post_json("/file/verify", verify_body(&hash, "big.iso", data.len()))
        .await;
    upload_all(&app, &hash, &data, &[3, 1]).await;

    let res = app
        .post_json("/file/verify", verify_body(&hash, "big.iso", data.len()))
        .await;
    assert_eq!(res.data()["shouldUpload"], true);
    assert_eq!(res.data()["uploadedList"], json!([1, 3]));
    assert_eq!(res.data()["chunkCount"], 4);
}

#[tokio::test]
async fn test_duplicate_chunk_is_acknowledged() {
    let app = TestApp::new().await;
    let data = payload(2 * CHUNK);
    let hash = md5_hex(&data);

    app.post_json("/file/verify", verify_body(&hash, "d.bin", data.len()))
        .await;
    let first = app.post_chunk(&hash, 1, Some(TOKEN), &data[CHUNK..]).await;
    let second = app.post_chunk(&hash, 1, Some(TOKEN), &data[CHUNK..]).await;

    assert_eq!(first.body["message"], "Chunk uploaded");
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["message"], "Chunk already uploaded");
    assert_eq!(second.data()["chunkIndex"], 1);
    assert_eq!(second.data()["fileHash"], hash);
}

#[tokio::test]
async fn test_merge_with_missing_chunks_is_rejected() {
    let app = TestApp::new().await;
    let data = payload(3 * CHUNK);
    let hash = md5_hex(&data);

    app.post_json("/file/verify", verify_body(&hash, "p.bin", data.len()))
        .await;
    upload_all(&app, &hash, &data, &[0, 2]).await;

    let res = app
        .post_json("/file/merge", merge_body(&hash, "p.bin", data.len()))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.code(), 400);
    assert!(res.body["message"].as_str().unwrap().contains("2/3"));
    assert_eq!(app.catalog.len().await, 0);
}

#[tokio::test]
async fn test_merge_rejects_content_hash_mismatch() {
    let app = TestApp::new().await;
    let data = payload(CHUNK);
    let wrong = md5_hex(b"something else");

    app.post_json("/file/verify", verify_body(&wrong, "m.bin", data.len()))
        .await;
    upload_all(&app, &wrong, &data, &[0]).await;

    let res = app
        .post_json("/file/merge", merge_body(&wrong, "m.bin", data.len()))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.code(), 422);
    assert_eq!(app.catalog.len().await, 0);
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let app = TestApp::new().await;
    let hash = md5_hex(b"never verified");

    let res = app.post_chunk(&hash, 0, Some(TOKEN), b"bytes").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.code(), 404);

    let res = app
        .post_json("/file/merge", merge_body(&hash, "x.bin", 5))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.code(), 404);
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let app = TestApp::new().await;
    let hash = md5_hex(b"data");

    let res = app
        .post_json(
            "/file/verify",
            json!({"fileHash": hash, "fileName": "a", "size": 4, "chunkSize": 4}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.code(), 400);
    assert_eq!(res.body["message"], "token is required");

    let res = app.post_chunk(&hash, 0, None, b"data").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.code(), 400);
}

#[tokio::test]
async fn test_invalid_verify_fields() {
    let app = TestApp::new().await;

    let res = app
        .post_json(
            "/file/verify",
            json!({"fileName": "a", "size": 4, "chunkSize": 4, "token": TOKEN}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.code(), 400);
    assert_eq!(res.body["message"], "fileHash is required");

    let res = app
        .post_json(
            "/file/verify",
            json!({"fileHash": "abc", "fileName": "a", "size": "0", "chunkSize": 4, "token": TOKEN}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.code(), 400);
}

#[tokio::test]
async fn test_chunk_index_out_of_range() {
    let app = TestApp::new().await;
    let data = payload(CHUNK);
    let hash = md5_hex(&data);

    app.post_json("/file/verify", verify_body(&hash, "r.bin", data.len()))
        .await;
    let res = app.post_chunk(&hash, 5, Some(TOKEN), &data).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.code(), 400);
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;

    let res = app.post_json("/health", json!({})).await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["ledger"], true);
    assert_eq!(body["data"]["storage"], true);
}

#[tokio::test]
async fn test_client_file_name_never_shapes_output_path() {
    let app = TestApp::new().await;
    let data = payload(CHUNK / 2);
    let hash = md5_hex(&data);
    let name = "x.y/../evil";

    app.post_json("/file/verify", verify_body(&hash, name, data.len()))
        .await;
    upload_all(&app, &hash, &data, &[0]).await;
    let res = app
        .post_json("/file/merge", merge_body(&hash, name, data.len()))
        .await;
    assert_eq!(res.code(), 200, "{:?}", res.body);

    let url = res.data()["url"].as_str().unwrap();
    let stored = url.trim_start_matches("http://quill.test/uploads/");
    assert!(!stored.contains(['/', '.']), "{stored}");

    let outputs: Vec<_> = std::fs::read_dir(app.dir.path())
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.file_name().to_string_lossy().starts_with("file-"))
        .collect();
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].file_type().unwrap().is_file());
    assert_eq!(outputs[0].file_name().to_string_lossy(), stored);
}
