//! HTTP server for the alert logs and media uploads.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Map, Value};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::append_log::AppendLog;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{iso_timestamp, NO_INTENSITY, UNKNOWN};

/// Multipart field holding an upload.
const MEDIA_FIELD: &str = "media";

/// Extension used when an upload has none.
const DEFAULT_MEDIA_EXTENSION: &str = ".webm";

/// Fields of an SOS entry kept verbatim when present.
const SOS_EXTRA_FIELDS: [&str; 3] = ["triggeredBy", "userProfile", "contactsNotified"];

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    sos_log: Arc<AppendLog>,
    shake_log: Arc<AppendLog>,
    sos_download_name: String,
    shake_download_name: String,
    uploads_dir: PathBuf,
}

impl AppState {
    /// Build state from the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            sos_log: Arc::new(AppendLog::new(config.sos_log_path())),
            shake_log: Arc::new(AppendLog::bounded(
                config.shake_log_path(),
                config.logs.max_motion_entries,
            )),
            sos_download_name: config.logs.sos_file.clone(),
            shake_download_name: config.logs.shake_file.clone(),
            uploads_dir: config.uploads_dir(),
        }
    }
}

/// An error answered as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// The request was unusable.
    BadRequest(String),
    /// The requested resource does not exist.
    NotFound(String),
    /// Something failed on our side.
    Internal(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Internal(err) => {
                error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the router.
pub fn router(config: &Config) -> Router {
    let state = AppState::from_config(config);

    let router = Router::new()
        .route("/health", get(health))
        .route("/sos", post(log_sos))
        .route("/shake-intensity", post(log_shake_intensity))
        .route("/download-sos", get(download_sos))
        .route("/download-shake-intensity", get(download_shake_intensity))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .with_state(state);

    let router = match &config.server.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address is invalid, cannot be bound, or the server
/// fails.
pub async fn serve(config: &Config, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let addr = config.socket_addr()?;
    let uploads = config.uploads_dir();
    tokio::fs::create_dir_all(&uploads)
        .await
        .map_err(|source| Error::DirectoryCreate {
            path: uploads,
            source,
        })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("✅ Server running at http://{addr}");

    axum::serve(listener, router(config))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolve once `signal` fires.
///
/// A signal that cannot be installed is logged and never resolves, so a
/// missing handler does not read as an interrupt.
pub async fn interrupted(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
    }))
}

/// A field's value unless it is missing, null or an empty string.
fn present(body: &Map<String, Value>, key: &str) -> Option<Value> {
    match body.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(value) => Some(value.clone()),
    }
}

fn now() -> Value {
    Value::String(iso_timestamp(Utc::now()))
}

/// Normalize an SOS submission.
#[must_use]
pub fn sos_entry(body: &Map<String, Value>) -> Value {
    let mut entry = Map::new();
    entry.insert(
        "user".to_string(),
        present(body, "user").unwrap_or_else(|| json!("Anonymous")),
    );
    entry.insert("time".to_string(), present(body, "time").unwrap_or_else(now));
    entry.insert(
        "intensity".to_string(),
        present(body, "intensity").unwrap_or_else(|| json!(NO_INTENSITY)),
    );
    entry.insert(
        "location".to_string(),
        present(body, "location").unwrap_or_else(|| json!(UNKNOWN)),
    );
    for key in SOS_EXTRA_FIELDS {
        if let Some(value) = present(body, key) {
            entry.insert(key.to_string(), value);
        }
    }
    Value::Object(entry)
}

/// Normalize a motion sample submission.
#[must_use]
pub fn shake_entry(body: &Map<String, Value>) -> Value {
    json!({
        "intensity": present(body, "intensity").unwrap_or_else(|| json!("0")),
        "acceleration": present(body, "acceleration")
            .unwrap_or_else(|| json!({ "x": "0", "y": "0", "z": "0" })),
        "timestamp": present(body, "timestamp").unwrap_or_else(now),
    })
}

fn body_map(body: Option<Json<Value>>) -> Map<String, Value> {
    match body {
        Some(Json(Value::Object(map))) => map,
        _ => Map::new(),
    }
}

async fn log_sos(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let entry = sos_entry(&body_map(body));
    state.sos_log.append(&entry).await?;
    info!(user = %entry["user"], "🚨 SOS logged");

    Ok(Json(json!({ "status": "SOS data logged successfully" })))
}

async fn log_shake_intensity(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let entry = shake_entry(&body_map(body));
    state.shake_log.append(&entry).await?;

    Ok(Json(json!({ "status": "Shake intensity logged successfully" })))
}

async fn download(log: &AppendLog, file_name: &str, missing: &str) -> ApiResult<Response> {
    let Some(body) = log.read_raw().await? else {
        return Err(ApiError::NotFound(missing.to_string()));
    };

    let disposition = format!("attachment; filename=\"{file_name}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn download_sos(State(state): State<AppState>) -> ApiResult<Response> {
    download(&state.sos_log, &state.sos_download_name, "No SOS logs found").await
}

async fn download_shake_intensity(State(state): State<AppState>) -> ApiResult<Response> {
    download(
        &state.shake_log,
        &state.shake_download_name,
        "No shake intensity logs found",
    )
    .await
}

/// Stored name for an upload: `recording-<unix millis><ext>`.
#[must_use]
pub fn upload_file_name(original: Option<&str>, millis: i64) -> String {
    let ext = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map_or_else(|| DEFAULT_MEDIA_EXTENSION.to_string(), |ext| format!(".{ext}"));
    format!("recording-{millis}{ext}")
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<Value>> {
    let no_file = || ApiError::BadRequest("No file uploaded".to_string());

    while let Some(field) = multipart.next_field().await.map_err(|_| no_file())? {
        if field.name() != Some(MEDIA_FIELD) {
            continue;
        }

        let filename = upload_file_name(field.file_name(), Utc::now().timestamp_millis());
        let data = field.bytes().await.map_err(|_| no_file())?;

        tokio::fs::create_dir_all(&state.uploads_dir)
            .await
            .map_err(|source| Error::DirectoryCreate {
                path: state.uploads_dir.clone(),
                source,
            })?;
        let path = state.uploads_dir.join(&filename);
        tokio::fs::write(&path, &data).await.map_err(Error::from)?;
        info!(file = %filename, bytes = data.len(), "Upload stored");

        return Ok(Json(json!({
            "status": "success",
            "filename": filename,
            "path": path.display().to_string(),
        })));
    }

    Err(no_file())
}
