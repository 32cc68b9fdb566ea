//! Error taxonomy for workspace operations.
//!
//! Components return [`WorkspaceError`]. The service façade wraps it in a
//! [`ServiceError`] that also names the operation, so a caller always sees
//! operation, path and reason together.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors produced by the sandbox, policy check, and workspace components.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("path escapes the workspace: {}", path.display())]
    PathEscape { path: PathBuf },

    #[error("write policy denied {}: {reason}", path.display())]
    PolicyDenied { path: PathBuf, reason: String },

    #[error("workspace is read-only")]
    ReadOnly,

    #[error("not found: {} ({reason})", path.display())]
    NotFound { path: PathBuf, reason: String },

    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkspaceError {
    pub(crate) fn not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::NotFound {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Map an I/O error, folding `NotFound` into the taxonomy.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(path, "no such file or directory")
        } else {
            Self::Io { path, source }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkspaceError::PathEscape { .. } => ErrorKind::PathEscape,
            WorkspaceError::PolicyDenied { .. } => ErrorKind::PolicyDenied,
            WorkspaceError::ReadOnly => ErrorKind::ReadOnly,
            WorkspaceError::NotFound { .. } => ErrorKind::NotFound,
            WorkspaceError::InvalidPattern { .. } => ErrorKind::InvalidPattern,
            WorkspaceError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            WorkspaceError::Io { .. } => ErrorKind::Io,
            WorkspaceError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Stable, serialisable error tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PathEscape,
    PolicyDenied,
    ReadOnly,
    NotFound,
    InvalidPattern,
    InvalidArgument,
    Io,
    Internal,
    Timeout,
}

impl ErrorKind {
    /// Security and policy violations. Never retried.
    pub fn is_security(self) -> bool {
        matches!(
            self,
            ErrorKind::PathEscape | ErrorKind::PolicyDenied | ErrorKind::ReadOnly
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::PathEscape => "path_escape",
            ErrorKind::PolicyDenied => "policy_denied",
            ErrorKind::ReadOnly => "read_only",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidPattern => "invalid_pattern",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
            ErrorKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// A failed façade operation.
#[derive(Debug, thiserror::Error)]
#[error("{operation}: {error}")]
pub struct ServiceError {
    /// Operation name, e.g. `fs.write`.
    pub operation: &'static str,
    #[source]
    pub error: WorkspaceError,
}

impl ServiceError {
    pub fn new(operation: &'static str, error: WorkspaceError) -> Self {
        Self { operation, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;
