//! End-to-end checks of the HTTP API against a temporary data directory.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sos_beacon::server;
use sos_beacon::Config;
use tempfile::TempDir;
use tower::ServiceExt;

fn app() -> (Router, TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.server.data_dir = Some(dir.path().to_path_buf());
    (server::router(&config), dir, config)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn read_log(path: &std::path::Path) -> Vec<Value> {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _dir, _) = app();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_post_sos_appends_with_defaults() {
    let (app, _dir, config) = app();

    let response = app
        .clone()
        .oneshot(post_json("/sos", &json!({ "user": "Asha", "triggeredBy": "Manual" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "status": "SOS data logged successfully" })
    );

    app.oneshot(post_json("/sos", &json!({}))).await.unwrap();

    let entries = read_log(&config.sos_log_path());
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["user"], "Asha");
    assert_eq!(entries[0]["triggeredBy"], "Manual");
    assert_eq!(entries[1]["user"], "Anonymous");
    assert_eq!(entries[1]["intensity"], "N/A");
    assert_eq!(entries[1]["location"], "Unknown");
}

#[tokio::test]
async fn test_post_sos_without_body() {
    let (app, _dir, config) = app();

    let request = Request::builder()
        .method("POST")
        .uri("/sos")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_log(&config.sos_log_path())[0]["user"], "Anonymous");
}

#[tokio::test]
async fn test_shake_log_is_bounded() {
    let (app, _dir, config) = app();
    let seeded: Vec<Value> = (0..1000).map(|i| json!({ "intensity": i.to_string() })).collect();
    std::fs::write(config.shake_log_path(), serde_json::to_vec(&seeded).unwrap()).unwrap();

    let response = app
        .oneshot(post_json("/shake-intensity", &json!({ "intensity": "16.20" })))
        .await
        .unwrap();
    assert_eq!(
        json_body(response).await,
        json!({ "status": "Shake intensity logged successfully" })
    );

    let entries = read_log(&config.shake_log_path());
    assert_eq!(entries.len(), 1000);
    assert_eq!(entries[0]["intensity"], "1");
    assert_eq!(entries[999]["intensity"], "16.20");
    assert_eq!(entries[999]["acceleration"], json!({ "x": "0", "y": "0", "z": "0" }));
}

#[tokio::test]
async fn test_downloads_missing() {
    let (app, _dir, _) = app();

    let response = app.clone().oneshot(get("/download-sos")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({ "error": "No SOS logs found" }));

    let response = app.oneshot(get("/download-shake-intensity")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "No shake intensity logs found" })
    );
}

#[tokio::test]
async fn test_download_sos_attachment() {
    let (app, _dir, _) = app();
    app.clone()
        .oneshot(post_json("/sos", &json!({ "user": "Asha" })))
        .await
        .unwrap();

    let response = app.oneshot(get("/download-sos")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"sos_log.json\""
    );

    let body = json_body(response).await;
    assert_eq!(body[0]["user"], "Asha");
}

#[tokio::test]
async fn test_corrupt_log_is_a_server_error() {
    let (app, _dir, config) = app();
    std::fs::write(config.sos_log_path(), "oops").unwrap();

    let response = app.oneshot(post_json("/sos", &json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(response).await["error"].is_string());
    assert_eq!(std::fs::read_to_string(config.sos_log_path()).unwrap(), "oops");
}

fn multipart(field: &str, file_name: &str, content: &str) -> Request<Body> {
    let boundary = "sosbeaconboundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         {content}\r\n\
         --{boundary}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_upload_stores_recording() {
    let (app, _dir, config) = app();

    let response = app
        .oneshot(multipart("media", "clip.mp4", "not really video"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    let filename = body["filename"].as_str().unwrap();
    assert!(filename.starts_with("recording-"));
    assert!(filename.ends_with(".mp4"));

    let stored = config.uploads_dir().join(filename);
    assert_eq!(std::fs::read_to_string(stored).unwrap(), "not really video");
}

#[tokio::test]
async fn test_upload_defaults_to_webm() {
    let (app, _dir, _) = app();

    let response = app.oneshot(multipart("media", "recording", "x")).await.unwrap();
    let body = json_body(response).await;
    assert!(body["filename"].as_str().unwrap().ends_with(".webm"));
}

#[tokio::test]
async fn test_upload_without_media_field() {
    let (app, _dir, _) = app();

    let response = app.oneshot(multipart("other", "clip.mp4", "x")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({ "error": "No file uploaded" }));
}

#[tokio::test]
async fn test_static_fallback() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>SOS</h1>").unwrap();
    let mut config = Config::default();
    config.server.data_dir = Some(dir.path().to_path_buf());
    config.server.static_dir = Some(dir.path().to_path_buf());

    let response = server::router(&config)
        .oneshot(get("/index.html"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
