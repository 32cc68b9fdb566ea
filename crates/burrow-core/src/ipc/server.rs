//! IPC server: axum HTTP router over a Unix domain socket.
//!
//! Each route deserializes its request, calls the matching [`Service`]
//! operation and serializes the result. Non-mutating operations run under
//! the configured request timeout; writes and deletes always run to
//! completion.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

use burrow_config::AppConfig;

use super::types::*;
use crate::daemon::ShutdownSignal;
use crate::error::{ErrorKind, ServiceError};
use crate::files::{RangeRead, WriteOutcome};
use crate::service::Service;

/// Shared state accessible to all IPC route handlers.
pub struct IpcState {
    pub service: Service,
    pub shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

/// Build the axum router with all IPC routes.
pub fn router(state: Arc<IpcState>) -> axum::Router {
    axum::Router::new()
        .route("/health", get(handle_health))
        .route("/stop", post(handle_stop))
        .route("/fs/list", post(handle_fs_list))
        .route("/fs/read", post(handle_fs_read))
        .route("/fs/write", post(handle_fs_write))
        .route("/fs/delete", post(handle_fs_delete))
        .route("/repo/list", post(handle_repo_list))
        .route("/repo/read", post(handle_repo_read))
        .route("/repo/search", post(handle_repo_search))
        .route("/symbols/index", post(handle_symbols_index))
        .route("/symbols/search", post(handle_symbols_search))
        .route("/dep/graph", post(handle_dep_graph))
        .with_state(state)
}

/// Start the IPC server on the given Unix socket path.
///
/// Removes any stale socket file before binding. Runs until the
/// shutdown signal is received.
pub async fn serve(
    socket_path: &Path,
    state: Arc<IpcState>,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
) -> Result<(), std::io::Error> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "IPC server listening");

    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("IPC server shutting down");
        })
        .await?;

    std::fs::remove_file(socket_path).ok();
    Ok(())
}

/// Resolve the socket path from config.
pub fn socket_path_from_config(config: &AppConfig) -> PathBuf {
    PathBuf::from(&config.daemon.socket_path)
}

// ── Errors ──────────────────────────────────────────────────────────────

/// A failed request, rendered as an [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(kind: ErrorKind, operation: &'static str, message: String) -> Self {
        Self {
            status: status_for(kind),
            body: ErrorResponse {
                error: ErrorBody {
                    kind,
                    operation: operation.to_string(),
                    message,
                },
            },
        }
    }

    fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            operation,
            format!("request exceeded {}s", after.as_secs()),
        )
    }

    fn bad_body(operation: &'static str, rejection: JsonRejection) -> Self {
        Self::new(ErrorKind::InvalidArgument, operation, rejection.body_text())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self {
            status: status_for(err.kind()),
            body: ErrorResponse::from(&err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::PathEscape | ErrorKind::PolicyDenied | ErrorKind::ReadOnly => {
            StatusCode::FORBIDDEN
        }
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidPattern | ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// A request body that may have failed to parse.
type Payload<T> = Result<Json<T>, JsonRejection>;

/// Unwrap a request body, turning a parse failure into `invalid_argument`.
fn parse<T>(operation: &'static str, payload: Payload<T>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(req)) => Ok(req),
        Err(rejection) => {
            warn!(operation, error = %rejection.body_text(), "Malformed request body");
            Err(ApiError::bad_body(operation, rejection))
        }
    }
}

/// Run a non-mutating operation under the request timeout.
async fn bounded<T, F>(state: &IpcState, operation: &'static str, fut: F) -> ApiResult<T>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    let limit = Duration::from_secs(state.service.config().limits.request_timeout_secs);
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Ok(Json(result?)),
        Err(_) => {
            warn!(operation, timeout_secs = limit.as_secs(), "Request timed out");
            Err(ApiError::timeout(operation, limit))
        }
    }
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_health(State(state): State<Arc<IpcState>>) -> Json<HealthResponse> {
    Json(state.service.health())
}

async fn handle_stop(State(state): State<Arc<IpcState>>) -> Json<StopResponse> {
    info!("Stop requested via IPC");
    let _ = state.shutdown_tx.send(ShutdownSignal);
    Json(StopResponse {
        acknowledged: true,
        message: "Shutdown initiated".to_string(),
    })
}

async fn handle_fs_list(
    State(state): State<Arc<IpcState>>,
    payload: Payload<FsListRequest>,
) -> ApiResult<FsListResponse> {
    let req = parse("fs.list", payload)?;
    bounded(&state, "fs.list", state.service.fs_list(req)).await
}

async fn handle_fs_read(
    State(state): State<Arc<IpcState>>,
    payload: Payload<FsReadRequest>,
) -> ApiResult<FsReadResponse> {
    let req = parse("fs.read", payload)?;
    bounded(&state, "fs.read", state.service.fs_read(req)).await
}

async fn handle_fs_write(
    State(state): State<Arc<IpcState>>,
    payload: Payload<FsWriteRequest>,
) -> ApiResult<WriteOutcome> {
    let req = parse("fs.write", payload)?;
    Ok(Json(state.service.fs_write(req).await?))
}

async fn handle_fs_delete(
    State(state): State<Arc<IpcState>>,
    payload: Payload<FsDeleteRequest>,
) -> ApiResult<FsDeleteResponse> {
    let req = parse("fs.delete", payload)?;
    Ok(Json(state.service.fs_delete(req).await?))
}

async fn handle_repo_list(
    State(state): State<Arc<IpcState>>,
    payload: Payload<RepoListRequest>,
) -> ApiResult<RepoListResponse> {
    let req = parse("repo.list", payload)?;
    bounded(&state, "repo.list", state.service.repo_list(req)).await
}

async fn handle_repo_read(
    State(state): State<Arc<IpcState>>,
    payload: Payload<RepoReadRequest>,
) -> ApiResult<RangeRead> {
    let req = parse("repo.read", payload)?;
    bounded(&state, "repo.read", state.service.repo_read(req)).await
}

async fn handle_repo_search(
    State(state): State<Arc<IpcState>>,
    payload: Payload<RepoSearchRequest>,
) -> ApiResult<RepoSearchResponse> {
    let req = parse("repo.search", payload)?;
    bounded(&state, "repo.search", state.service.repo_search(req)).await
}

async fn handle_symbols_index(
    State(state): State<Arc<IpcState>>,
    payload: Payload<SymbolsIndexRequest>,
) -> ApiResult<SymbolsIndexResponse> {
    let req = parse("symbols.index", payload)?;
    bounded(&state, "symbols.index", state.service.symbols_index(req)).await
}

async fn handle_symbols_search(
    State(state): State<Arc<IpcState>>,
    payload: Payload<SymbolsSearchRequest>,
) -> ApiResult<SymbolsSearchResponse> {
    let req = parse("symbols.search", payload)?;
    bounded(&state, "symbols.search", state.service.symbols_search(req)).await
}

async fn handle_dep_graph(
    State(state): State<Arc<IpcState>>,
    payload: Payload<DepGraphRequest>,
) -> ApiResult<DepGraphResponse> {
    let req = parse("dep.graph", payload)?;
    bounded(&state, "dep.graph", state.service.dep_graph(req)).await
}
