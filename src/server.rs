//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/datasets` | Newest-first dataset summaries with counts |
//! | `POST` | `/datasets` | Create a dataset and get a pre-signed upload URL |
//! | `GET`  | `/datasets/{id}` | Dataset, its documents and first 100 samples |
//! | `POST` | `/datasets/{id}/parse` | Parse the uploaded PDF into samples |
//! | `POST` | `/storage` | Pre-sign a `GET` or `PUT` for any key |
//! | `GET`  | `/queue` | Task queue status |
//! | `GET`  | `/health` | Configuration presence flags |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Invalid request body",
//!              "details": [{ "path": "name", "message": "must not be empty" }] } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `extraction_failed` (500), `internal` (500). Internal failures are logged
//! and returned without detail.
//!
//! Parse requests run on the shared [`TaskQueue`], so at most one parse is in
//! flight per process.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db;
use crate::error::IngestError;
use crate::ingest::Ingestor;
use crate::migrate;
use crate::models::{DatasetDetail, DatasetSummary};
use crate::queue::{QueueError, QueueStatus, TaskQueue};
use crate::storage::{PresignMethod, S3Storage, DEFAULT_PRESIGN_TTL_SECS};
use crate::store::SqliteStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    ingestor: Ingestor,
    queue: TaskQueue,
}

impl AppState {
    pub fn new(config: Config, ingestor: Ingestor, queue: TaskQueue) -> Self {
        Self {
            config: Arc::new(config),
            ingestor,
            queue,
        }
    }
}

/// Build the application router. Exposed separately from [`run_server`] so
/// tests can drive it without binding a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/datasets", get(handle_list_datasets).post(handle_create_dataset))
        .route("/datasets/{id}", get(handle_get_dataset))
        .route("/datasets/{id}/parse", post(handle_parse_dataset))
        .route("/storage", post(handle_presign))
        .route("/queue", get(handle_queue_status))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Connect to the database and object storage, then serve until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db.url).await?;
    migrate::run_migrations(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool));
    let storage = Arc::new(S3Storage::new(&config.s3)?);
    let ingestor = Ingestor::new(store, storage);
    let state = AppState::new(config.clone(), ingestor, TaskQueue::new());

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, env = config.env.as_str(), "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl AppError {
    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
        details: None,
    }
}

fn internal_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: "internal error".to_string(),
        details: None,
    }
}

fn status_for(code: &str) -> StatusCode {
    match code {
        "bad_request" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "conflict" => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn invalid_body(issues: Vec<(String, String)>) -> AppError {
    let details: Vec<serde_json::Value> = issues
        .into_iter()
        .map(|(path, message)| json!({ "path": path, "message": message }))
        .collect();
    bad_request("Invalid request body").with_details(json!(details))
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        if let IngestError::Validation { field, message } = err {
            return invalid_body(vec![(field, message)]);
        }
        if !err.is_client_visible() {
            tracing::error!(error = %err, "request failed");
            return internal_error();
        }
        let code = err.code();
        if code == "extraction_failed" {
            tracing::warn!(error = %err, "extraction failed");
        }
        AppError {
            status: status_for(code),
            code: code.to_string(),
            message: err.to_string(),
            details: None,
        }
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        tracing::error!(error = %err, "queued task failed");
        internal_error()
    }
}

/// Decode a JSON body, separating unparseable input from a body of the
/// wrong shape.
fn parse_body<T: DeserializeOwned>(
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(value) = body.map_err(|rejection| {
        bad_request("Malformed JSON").with_details(json!({ "reason": rejection.body_text() }))
    })?;
    serde_json::from_value(value).map_err(|e| {
        bad_request("Invalid request body").with_details(json!([{ "message": e.to_string() }]))
    })
}

// ============ GET /health ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    ok: bool,
    env: &'static str,
    has_db: bool,
    has_redis: bool,
    has_s3: bool,
}

/// Reports which backing services are configured. Does not contact them.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        env: state.config.env.as_str(),
        has_db: state.config.has_db(),
        has_redis: state.config.has_redis(),
        has_s3: state.config.has_s3(),
    })
}

// ============ /datasets ============

#[derive(Serialize)]
struct DatasetListResponse {
    datasets: Vec<DatasetSummary>,
}

async fn handle_list_datasets(
    State(state): State<AppState>,
) -> Result<Json<DatasetListResponse>, AppError> {
    let datasets = state.ingestor.list_datasets().await?;
    Ok(Json(DatasetListResponse { datasets }))
}

#[derive(Deserialize)]
struct CreateDatasetRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDatasetResponse {
    dataset_id: String,
    upload: UploadTarget,
}

#[derive(Serialize)]
struct UploadTarget {
    url: String,
    key: String,
}

async fn handle_create_dataset(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateDatasetResponse>), AppError> {
    let req: CreateDatasetRequest = parse_body(body)?;
    let name = req
        .name
        .ok_or_else(|| invalid_body(vec![("name".into(), "required".into())]))?;

    let created = state
        .ingestor
        .create_dataset(&name, req.description.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateDatasetResponse {
            dataset_id: created.dataset_id,
            upload: UploadTarget {
                url: created.upload_url,
                key: created.object_key,
            },
        }),
    ))
}

async fn handle_get_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DatasetDetail>, AppError> {
    Ok(Json(state.ingestor.get_dataset(&id).await?))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParseResponse {
    ok: bool,
    document_id: String,
    samples: usize,
}

async fn handle_parse_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ParseResponse>, AppError> {
    let ingestor = state.ingestor.clone();
    let dataset_id = id.clone();
    let outcome = state
        .queue
        .run(format!("parse:{}", id), async move {
            ingestor.parse_dataset(&dataset_id).await
        })
        .await??;

    Ok(Json(ParseResponse {
        ok: true,
        document_id: outcome.document_id,
        samples: outcome.sample_count,
    }))
}

// ============ POST /storage ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresignRequest {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Serialize)]
struct PresignResponse {
    url: String,
}

async fn handle_presign(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<PresignResponse>, AppError> {
    let req: PresignRequest = parse_body(body)?;

    let mut issues = Vec::new();
    let key = req.key.unwrap_or_default();
    if key.trim().is_empty() {
        issues.push(("key".to_string(), "required".to_string()));
    }
    let method = match req.method.as_deref() {
        None => {
            issues.push(("method".to_string(), "required".to_string()));
            None
        }
        Some(raw) => match raw.parse::<PresignMethod>() {
            Ok(m) => Some(m),
            Err(e) => {
                issues.push(("method".to_string(), e));
                None
            }
        },
    };
    let method = match method {
        Some(m) if issues.is_empty() => m,
        _ => return Err(invalid_body(issues)),
    };

    state.ingestor.ensure_bucket().await?;
    let url = state.ingestor.presign(
        &key,
        method,
        req.content_type.as_deref(),
        DEFAULT_PRESIGN_TTL_SECS,
    )?;
    Ok(Json(PresignResponse { url }))
}

// ============ GET /queue ============

async fn handle_queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.queue.status())
}
