//! IPC client: connects to the daemon over a Unix domain socket.
//!
//! Provides a typed method per workspace operation. Uses `hyper` for
//! HTTP/1.1 over the Unix socket.

use std::path::PathBuf;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, header};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;
use tracing::debug;

use super::types::*;
use crate::error::ErrorKind;
use crate::files::{RangeRead, WriteOutcome};

/// Errors from the IPC client.
#[derive(Debug, thiserror::Error)]
pub enum IpcClientError {
    #[error("failed to connect to daemon socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("daemon is not running (socket not found at {0})")]
    NotRunning(PathBuf),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} failed ({kind}): {message}")]
    Service {
        kind: ErrorKind,
        operation: String,
        message: String,
    },
}

/// Client for communicating with the burrow daemon via Unix socket.
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    /// Create a new IPC client targeting the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Check if the daemon socket exists (daemon is likely running).
    pub fn daemon_available(&self) -> bool {
        self.socket_path.exists()
    }

    /// One HTTP/1.1 exchange over a fresh socket connection.
    ///
    /// Non-2xx replies carrying an [`ErrorResponse`] become
    /// [`IpcClientError::Service`].
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Bytes, IpcClientError> {
        if !self.daemon_available() {
            return Err(IpcClientError::NotRunning(self.socket_path.clone()));
        }

        let stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|e| IpcClientError::Connect {
                    path: self.socket_path.clone(),
                    source: e,
                })?;

        let (mut sender, conn) =
            hyper::client::conn::http1::handshake::<_, Full<Bytes>>(TokioIo::new(stream))
                .await
                .map_err(|e| IpcClientError::Request(format!("HTTP handshake failed: {e}")))?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!(error = %e, "IPC connection error");
            }
        });

        debug!(%method, path, "IPC request");

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(path)
            .header(header::HOST, "localhost");
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let req = builder
            .body(Full::new(body.map(Bytes::from).unwrap_or_default()))
            .map_err(|e| IpcClientError::Request(format!("failed to build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| IpcClientError::Request(format!("request failed: {e}")))?;
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| IpcClientError::Request(format!("failed to read response body: {e}")))?
            .to_bytes();

        if status.is_success() {
            return Ok(bytes);
        }
        match serde_json::from_slice::<ErrorResponse>(&bytes) {
            Ok(ErrorResponse { error }) => Err(IpcClientError::Service {
                kind: error.kind,
                operation: error.operation,
                message: error.message,
            }),
            Err(_) => Err(IpcClientError::Request(format!(
                "unexpected status: {status}"
            ))),
        }
    }

    /// POST a JSON request and decode the JSON response.
    async fn call<Req, Resp>(&self, path: &str, req: &Req) -> Result<Resp, IpcClientError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let body_bytes = serde_json::to_vec(req)
            .map_err(|e| IpcClientError::Parse(format!("failed to serialize request: {e}")))?;
        let body = self.request(Method::POST, path, Some(body_bytes)).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("{path}: {e}")))
    }

    // ── Typed API methods ──────────────────────────────────────────────

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthResponse, IpcClientError> {
        let body = self.request(Method::GET, "/health", None).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("health: {e}")))
    }

    /// Ask the daemon to shut down gracefully.
    pub async fn stop(&self) -> Result<StopResponse, IpcClientError> {
        let body = self.request(Method::POST, "/stop", None).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("stop: {e}")))
    }

    pub async fn fs_list(&self, req: &FsListRequest) -> Result<FsListResponse, IpcClientError> {
        self.call("/fs/list", req).await
    }

    pub async fn fs_read(&self, req: &FsReadRequest) -> Result<FsReadResponse, IpcClientError> {
        self.call("/fs/read", req).await
    }

    pub async fn fs_write(&self, req: &FsWriteRequest) -> Result<WriteOutcome, IpcClientError> {
        self.call("/fs/write", req).await
    }

    pub async fn fs_delete(
        &self,
        req: &FsDeleteRequest,
    ) -> Result<FsDeleteResponse, IpcClientError> {
        self.call("/fs/delete", req).await
    }

    pub async fn repo_list(
        &self,
        req: &RepoListRequest,
    ) -> Result<RepoListResponse, IpcClientError> {
        self.call("/repo/list", req).await
    }

    pub async fn repo_read(&self, req: &RepoReadRequest) -> Result<RangeRead, IpcClientError> {
        self.call("/repo/read", req).await
    }

    pub async fn repo_search(
        &self,
        req: &RepoSearchRequest,
    ) -> Result<RepoSearchResponse, IpcClientError> {
        self.call("/repo/search", req).await
    }

    pub async fn symbols_index(
        &self,
        req: &SymbolsIndexRequest,
    ) -> Result<SymbolsIndexResponse, IpcClientError> {
        self.call("/symbols/index", req).await
    }

    pub async fn symbols_search(
        &self,
        req: &SymbolsSearchRequest,
    ) -> Result<SymbolsSearchResponse, IpcClientError> {
        self.call("/symbols/search", req).await
    }

    pub async fn dep_graph(
        &self,
        req: &DepGraphRequest,
    ) -> Result<DepGraphResponse, IpcClientError> {
        self.call("/dep/graph", req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = IpcClient::new("/tmp/test-burrow.sock");
        assert!(!client.daemon_available()); // socket doesn't exist
    }

    #[tokio::test]
    async fn test_client_not_running_error() {
        let client = IpcClient::new("/tmp/nonexistent-burrow.sock");
        let result = client.health().await;
        assert!(matches!(result, Err(IpcClientError::NotRunning(_))));
    }

    #[tokio::test]
    async fn test_integration_server_client() {
        use std::sync::Arc;
        use tokio::sync::broadcast;

        use super::super::server;
        use crate::service::Service;

        let workspace = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(workspace.path().join("src")).unwrap();
        std::fs::write(
            workspace.path().join("src/app.ts"),
            "import { x } from './x';\nexport function main() {}\n",
        )
        .unwrap();

        let mut config = burrow_config::AppConfig::default();
        config.workspace.root = workspace.path().to_path_buf();
        let service = Service::from_config(config).await.unwrap();

        let (shutdown_tx, _) = broadcast::channel(1);
        let state = Arc::new(server::IpcState {
            service,
            shutdown_tx: shutdown_tx.clone(),
        });

        // Use a unique socket path for this test
        let sock_path =
            std::env::temp_dir().join(format!("burrow-test-ipc-{}.sock", std::process::id()));
        std::fs::remove_file(&sock_path).ok();

        let sock_path_clone = sock_path.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let server_handle = tokio::spawn(async move {
            server::serve(&sock_path_clone, state, shutdown_rx)
                .await
                .unwrap();
        });

        // Give server time to bind
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let client = IpcClient::new(&sock_path);
        assert!(client.daemon_available());

        let health = client.health().await.unwrap();
        assert_eq!(health.status, "ok");
        assert!(!health.read_only);

        let listed = client.repo_list(&RepoListRequest::default()).await.unwrap();
        assert_eq!(listed.files.len(), 1);
        assert_eq!(listed.files[0].path, "src/app.ts");

        let written = client
            .fs_write(&FsWriteRequest {
                path: "src/x.ts".to_string(),
                content: "export const x = 1;\n".to_string(),
                encoding: ContentEncoding::Utf8,
                create_dirs: true,
            })
            .await
            .unwrap();
        assert!(written.ok);

        let graph = client.dep_graph(&DepGraphRequest::default()).await.unwrap();
        assert_eq!(graph.nodes, vec!["src/app.ts", "src/x.ts"]);
        assert_eq!(graph.dependencies_of("src/app.ts"), vec!["./x"]);

        let err = client
            .fs_read(&FsReadRequest {
                path: "../outside".to_string(),
                as_binary: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IpcClientError::Service {
                kind: ErrorKind::PathEscape,
                ..
            }
        ));

        let _ = shutdown_tx.send(crate::daemon::ShutdownSignal);
        let _ = tokio::time::timeout(std::time::Duration::from_secs(2), server_handle).await;
        std::fs::remove_file(&sock_path).ok();
    }
}
