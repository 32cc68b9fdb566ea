//! Core daemon process: startup, shutdown, and main event loop.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use burrow_config::AppConfig;

use crate::ipc::server::{self, IpcState};
use crate::service::{Service, StartupError};

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// The burrow daemon: one workspace service behind the IPC socket.
pub struct Daemon {
    config: AppConfig,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl Daemon {
    /// Create a new daemon instance with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            shutdown_tx,
        }
    }

    /// Run the daemon until a shutdown signal or Ctrl-C is received.
    pub async fn run(&self) -> Result<(), DaemonError> {
        let service = Service::from_config(self.config.clone()).await?;
        let socket_path = server::socket_path_from_config(&self.config);

        info!(
            workspace = %self.config.workspace.name,
            socket = %socket_path.display(),
            "burrow daemon starting"
        );

        let state = Arc::new(IpcState {
            service,
            shutdown_tx: self.shutdown_tx.clone(),
        });
        let server_rx = self.shutdown_tx.subscribe();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let server_handle =
            tokio::spawn(async move { server::serve(&socket_path, state, server_rx).await });

        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping daemon");
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Ctrl-C received, initiating graceful shutdown");
                let _ = self.shutdown_tx.send(ShutdownSignal);
            }
        }

        match server_handle.await {
            Ok(result) => result?,
            Err(e) => return Err(DaemonError::Startup(format!("IPC server task failed: {e}"))),
        }

        info!("Daemon stopped");
        Ok(())
    }

    /// Request a graceful shutdown of the daemon.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(ShutdownSignal);
    }

    /// Get a reference to the daemon's configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("daemon startup failed: {0}")]
    Startup(String),

    #[error(transparent)]
    Service(#[from] StartupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_daemon_creation() {
        let daemon = Daemon::new(AppConfig::default());
        assert_eq!(daemon.config().daemon.socket_path, "/tmp/burrow.sock");
    }

    #[tokio::test]
    async fn test_daemon_shutdown_without_run() {
        let daemon = Daemon::new(AppConfig::default());
        // No subscribers yet; must not panic.
        daemon.shutdown();
    }

    #[tokio::test]
    async fn test_daemon_missing_root_fails_startup() {
        let mut config = AppConfig::default();
        config.workspace.root = "/nonexistent/burrow/workspace".into();
        let err = Daemon::new(config).run().await.unwrap_err();
        assert!(matches!(err, DaemonError::Service(_)));
    }

    #[tokio::test]
    async fn test_daemon_serves_until_shutdown() {
        let workspace = tempfile::TempDir::new().unwrap();
        let sock = std::env::temp_dir().join(format!("burrow-daemon-{}.sock", std::process::id()));
        let mut config = AppConfig::default();
        config.workspace.root = workspace.path().to_path_buf();
        config.daemon.socket_path = sock.display().to_string();

        let daemon = Arc::new(Daemon::new(config));
        let runner = Arc::clone(&daemon);
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sock.exists());

        daemon.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(!sock.exists());
    }
}
