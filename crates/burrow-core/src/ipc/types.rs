//! Request and response types for every workspace operation.
//!
//! These are serialized as JSON over the Unix domain socket transport and
//! are also the argument types of the [`Service`](crate::service::Service)
//! façade, so the in-process API and the daemon share one shape.
//! Limits and line numbers are signed on the wire so that a negative value
//! reaches validation instead of failing deserialization.

use serde::{Deserialize, Serialize};

use crate::build_info::BuildInfo;
use crate::context::{DependencyGraph, Symbol};
use crate::error::{ErrorKind, ServiceError};
use crate::files::{DirEntry, FileContent};
use crate::search::SearchMatch;
use crate::walker::FileEntry;

fn default_true() -> bool {
    true
}

fn default_list_limit() -> i64 {
    1000
}

fn default_search_limit() -> i64 {
    200
}

// ── fs.* ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FsListRequest {
    /// Directory to list; empty or `.` for the workspace root.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsListResponse {
    pub path: String,
    pub entries: Vec<DirEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsReadRequest {
    pub path: String,
    /// Always return base64, even for valid UTF-8.
    #[serde(default)]
    pub as_binary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsReadResponse {
    pub path: String,
    #[serde(flatten)]
    pub content: FileContent,
}

/// How [`FsWriteRequest::content`] is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentEncoding {
    #[default]
    Utf8,
    Base64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsWriteRequest {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub encoding: ContentEncoding,
    #[serde(default = "default_true")]
    pub create_dirs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsDeleteRequest {
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsDeleteResponse {
    pub ok: bool,
    pub path: String,
}

// ── repo.* ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoListRequest {
    /// Enumeration root; defaults to the workspace root.
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

impl Default for RepoListRequest {
    fn default() -> Self {
        Self {
            root: None,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            limit: default_list_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoListResponse {
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoReadRequest {
    pub path: String,
    /// First line to return, 1-based inclusive.
    #[serde(default)]
    pub start_line: Option<i64>,
    /// Last line to return, 1-based inclusive.
    #[serde(default)]
    pub end_line: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSearchRequest {
    pub query: String,
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

impl RepoSearchRequest {
    /// A literal, case-insensitive search with the default limit.
    pub fn literal(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            regex: false,
            case_sensitive: false,
            limit: default_search_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSearchResponse {
    pub matches: Vec<SearchMatch>,
}

// ── symbols.* / dep.graph ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolsIndexRequest {
    /// Roots to index; defaults to the whole workspace.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Language tags to index; defaults to every supported language.
    #[serde(default)]
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolsIndexResponse {
    pub indexed_file_count: usize,
    pub symbols: Vec<Symbol>,
    pub generation: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolsSearchRequest {
    /// `function` or `class`.
    #[serde(default)]
    pub kind: Option<String>,
    /// Case-insensitive substring.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolsSearchResponse {
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepGraphRequest {
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

pub type DepGraphResponse = DependencyGraph;

// ── health / errors ─────────────────────────────────────────────────────

/// Service health and identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub workspace: String,
    pub read_only: bool,
    /// Operation names this instance serves.
    pub capabilities: Vec<String>,
    pub version: String,
    pub build: BuildInfo,
    pub index_generation: u64,
    pub max_requests_per_minute: u32,
}

/// Daemon shutdown acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResponse {
    pub acknowledged: bool,
    pub message: String,
}

/// Error payload: `{ "error": { "kind", "operation", "message" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub operation: String,
    pub message: String,
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        Self {
            error: ErrorBody {
                kind: err.kind(),
                operation: err.operation.to_string(),
                message: err.error.to_string(),
            },
        }
    }
}
