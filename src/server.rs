//! HTTP surface: upload, convert, download and health endpoints.
//!
//! | Method | Path | Body / Response |
//! |--------|------|-----------------|
//! | `POST` | `/api/upload` | multipart `file` → `{message, filename, metadata}` |
//! | `POST` | `/api/convert` | multipart `file` [+ `password`] → `{filename, protected}` |
//! | `GET`  | `/api/download/{filename}` | artifact bytes as `application/pdf` |
//! | `GET`  | `/health` | liveness payload |
//!
//! Errors are returned as `{"error": <message>, "code": <CODE>}`.

use crate::convert::Pipeline;
use crate::error::{ErrorKind, PipelineError};
use crate::output::UploadReceipt;
use crate::pipeline::staging::UploadedDocument;
use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

/// Headroom above the file cap for multipart boundaries and the password field.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// Build the service router.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let body_limit = pipeline
        .config()
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/convert", post(convert))
        .route("/api/download/{filename}", get(download))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(AppState { pipeline })
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM.
pub async fn serve(addr: SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Server ready and accepting connections");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
    info!("Shutting down gracefully...");
}

// ── Error mapping ────────────────────────────────────────────────────────

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// A failed request: status plus error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn from_multipart(e: MultipartError) -> Self {
        let status = e.status();
        let error = PipelineError::MalformedUpload(e.body_text());
        Self {
            status: if status == StatusCode::PAYLOAD_TOO_LARGE {
                status
            } else {
                StatusCode::BAD_REQUEST
            },
            body: ErrorResponse {
                error: error.to_string(),
                code: error.kind().code().to_string(),
            },
        }
    }
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound | ErrorKind::InvalidName => StatusCode::NOT_FOUND,
        ErrorKind::ConversionError | ErrorKind::ProtectionError | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let kind = e.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            error!(code = kind.code(), "Request failed: {}", e);
        }
        Self {
            status,
            body: ErrorResponse {
                error: e.to_string(),
                code: kind.code().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "doc2pdf",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    message: &'static str,
    filename: String,
    metadata: UploadReceipt,
}

async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (document, _) = read_form(multipart).await?;
    let receipt = state.pipeline.upload(document).await?;
    Ok(Json(UploadResponse {
        message: "File uploaded successfully",
        filename: receipt.filename.clone(),
        metadata: receipt,
    }))
}

#[derive(Debug, Serialize)]
struct ConvertResponse {
    filename: String,
    protected: bool,
}

async fn convert(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let (document, password) = read_form(multipart).await?;
    let outcome = state.pipeline.run(document, password.as_deref()).await?;
    Ok(Json(ConvertResponse {
        filename: outcome.filename,
        protected: outcome.protected,
    }))
}

async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let artifact = state.pipeline.open_artifact(&filename).await?;
    let disposition = format!("attachment; filename=\"{}\"", artifact.name);
    let body = Body::from_stream(ReaderStream::new(artifact.file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, artifact.size)
        .body(body)
        .map_err(|e| PipelineError::Internal(format!("Failed to build response: {e}")).into())
}

/// Pull the `file` part and the optional `password` field out of a form.
async fn read_form(
    mut multipart: Multipart,
) -> Result<(UploadedDocument, Option<String>), ApiError> {
    let mut document = UploadedDocument::default();
    let mut password = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ApiError::from_multipart)?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                if document.bytes.is_some() {
                    return Err(PipelineError::MalformedUpload(
                        "send exactly one field named 'file'".into(),
                    )
                    .into());
                }
                document.filename = Some(field.file_name().unwrap_or_default().to_string());
                document.content_type = field.content_type().map(str::to_string);
                document.bytes = Some(field.bytes().await.map_err(ApiError::from_multipart)?);
            }
            Some("password") => {
                password = Some(field.text().await.map_err(ApiError::from_multipart)?);
            }
            _ => {}
        }
    }
    Ok((document, password))
}
