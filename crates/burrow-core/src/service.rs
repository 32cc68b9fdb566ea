//! Service façade: the workspace operations exposed to callers.
//!
//! Every operation follows the same order: validate arguments, resolve paths
//! through the [`Sandbox`], authorize mutations against the [`WritePolicy`],
//! then do the work. Scans (list, search, index, dep graph) run on the
//! bounded [`WorkerPool`] under their time budget, and plain reads run there
//! too so the transport timeout can interrupt them; writes and deletes run
//! inline. Failures come back as [`ServiceError`] naming the operation.
//!
//! ## Architecture
//!
//! ```text
//!   caller ──▶ Service ──▶ Sandbox ──▶ WritePolicy (mutations)
//!                 │
//!                 ├──▶ files        (fs.*, repo.read)
//!                 ├──▶ WorkerPool ──▶ walker / search / IndexStore
//!                 └──▶ IndexStore   (symbols.search)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, info, warn};

use burrow_config::{
    AppConfig, ConfigError, PolicyDecision, WriteOperation, WritePolicy, WritePolicyConfig,
};

use crate::build_info::BuildInfo;
use crate::context::{IndexScope, IndexStore, SymbolKind, SymbolQuery};
use crate::error::{ServiceError, WorkspaceError};
use crate::files::{self, WriteOutcome};
use crate::ipc::types::*;
use crate::lang::Language;
use crate::pool::{Deadline, WorkerPool};
use crate::sandbox::{ResolvedPath, Sandbox, to_slash};
use crate::search::{SearchRequest, search};
use crate::walker::{WalkOptions, enumerate};

/// Operation names, as reported by `health()`.
pub const CAPABILITIES: &[&str] = &[
    "fs.list",
    "fs.read",
    "fs.write",
    "fs.delete",
    "repo.list",
    "repo.read",
    "repo.search",
    "symbols.index",
    "symbols.search",
    "dep.graph",
    "health",
];

/// Errors that prevent the service from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
}

type OpResult<T> = Result<T, ServiceError>;

/// The workspace service. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct Service {
    config: Arc<AppConfig>,
    sandbox: Arc<Sandbox>,
    policy: Arc<WritePolicy>,
    store: Arc<IndexStore>,
    pool: WorkerPool,
}

impl Service {
    /// Build a service from configuration, loading the workspace policy file.
    pub async fn from_config(config: AppConfig) -> Result<Self, StartupError> {
        let policy_path = config.workspace.policy_path();
        let policy = WritePolicyConfig::load(&policy_path).await?.build_policy();
        Ok(Self::new(config, policy)?)
    }

    /// Build a service with an explicit policy.
    ///
    /// The policy file, when it lives inside the workspace, is added to the
    /// deny list.
    pub fn new(config: AppConfig, mut policy: WritePolicy) -> Result<Self, WorkspaceError> {
        let sandbox = Sandbox::new(&config.workspace.root)?;
        if let Some(relative) = policy_file_in_workspace(&sandbox, &config.workspace.policy_file) {
            policy.deny_prefix(&to_slash(&relative));
        }

        info!(
            workspace = %config.workspace.name,
            root = %sandbox.root().display(),
            read_only = config.workspace.read_only,
            workers = config.limits.worker_threads,
            "Workspace service ready"
        );

        Ok(Self {
            pool: WorkerPool::new(config.limits.worker_threads),
            config: Arc::new(config),
            sandbox: Arc::new(sandbox),
            policy: Arc::new(policy),
            store: Arc::new(IndexStore::new()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn policy(&self) -> &WritePolicy {
        &self.policy
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    // ── fs.* ────────────────────────────────────────────────────────────

    /// `fs.list`: immediate children of a directory.
    pub async fn fs_list(&self, req: FsListRequest) -> OpResult<FsListResponse> {
        const OP: &str = "fs.list";
        let dir = self.resolve(OP, &req.path)?;
        let path = dir.display_relative();
        let entries = self
            .pool
            .run(OP, move || files::list_dir(&dir))
            .await
            .and_then(|r| r)
            .map_err(|e| fail(OP, e))?;
        Ok(FsListResponse { path, entries })
    }

    /// `fs.read`: whole-file content, text or base64.
    pub async fn fs_read(&self, req: FsReadRequest) -> OpResult<FsReadResponse> {
        const OP: &str = "fs.read";
        let file = self.resolve(OP, &req.path)?;
        let path = file.display_relative();
        let as_binary = req.as_binary;
        let content = self
            .pool
            .run(OP, move || files::read_file(&file, as_binary))
            .await
            .and_then(|r| r)
            .map_err(|e| fail(OP, e))?;
        Ok(FsReadResponse { path, content })
    }

    /// `fs.write`: create or overwrite a file.
    pub async fn fs_write(&self, req: FsWriteRequest) -> OpResult<WriteOutcome> {
        const OP: &str = "fs.write";
        self.ensure_writable(OP)?;
        let target = self.resolve(OP, &req.path)?;
        self.authorize(OP, &target, WriteOperation::Write)?;

        let bytes = match req.encoding {
            ContentEncoding::Utf8 => req.content.into_bytes(),
            ContentEncoding::Base64 => BASE64.decode(req.content.as_bytes()).map_err(|e| {
                fail(
                    OP,
                    WorkspaceError::InvalidArgument(format!("content is not valid base64: {e}")),
                )
            })?,
        };

        files::write_file(&target, &bytes, req.create_dirs, self.policy.backup_on_write())
            .map_err(|e| fail(OP, e))
    }

    /// `fs.delete`: remove a file or directory.
    pub async fn fs_delete(&self, req: FsDeleteRequest) -> OpResult<FsDeleteResponse> {
        const OP: &str = "fs.delete";
        self.ensure_writable(OP)?;
        // The entry itself: deleting a link must not touch what it points to.
        let target = self
            .sandbox
            .resolve_entry(&req.path)
            .map_err(|e| fail(OP, e))?;
        self.authorize(OP, &target, WriteOperation::Delete)?;
        files::delete_path(&target, req.recursive).map_err(|e| fail(OP, e))?;
        Ok(FsDeleteResponse {
            ok: true,
            path: target.display_relative(),
        })
    }

    // ── repo.* ──────────────────────────────────────────────────────────

    /// `repo.list`: bounded enumeration with language tags.
    pub async fn repo_list(&self, req: RepoListRequest) -> OpResult<RepoListResponse> {
        const OP: &str = "repo.list";
        let limit = non_negative(OP, "limit", req.limit)?.min(self.config.limits.max_list_results);
        let root = self.resolve(OP, req.root.as_deref().unwrap_or(""))?;
        let options = WalkOptions {
            include: req.include_globs,
            exclude: req.exclude_globs,
            max_count: limit,
        };
        let deadline = Deadline::after(Duration::from_millis(
            self.config.limits.list_time_budget_ms,
        ));

        let sandbox = Arc::clone(&self.sandbox);
        let enumeration = self
            .pool
            .run(OP, move || enumerate(&sandbox, &root, &options, deadline))
            .await
            .and_then(|r| r)
            .map_err(|e| fail(OP, e))?;

        Ok(RepoListResponse {
            files: enumeration.entries,
        })
    }

    /// `repo.read`: optionally ranged read with a content hash.
    pub async fn repo_read(&self, req: RepoReadRequest) -> OpResult<files::RangeRead> {
        const OP: &str = "repo.read";
        let start = req
            .start_line
            .map(|n| non_negative(OP, "start_line", n))
            .transpose()?;
        let end = req
            .end_line
            .map(|n| non_negative(OP, "end_line", n))
            .transpose()?;
        let file = self.resolve(OP, &req.path)?;
        self.pool
            .run(OP, move || files::read_range(&file, start, end))
            .await
            .and_then(|r| r)
            .map_err(|e| fail(OP, e))
    }

    /// `repo.search`: literal or regex search with a hard result cap.
    pub async fn repo_search(&self, req: RepoSearchRequest) -> OpResult<RepoSearchResponse> {
        const OP: &str = "repo.search";
        let limit =
            non_negative(OP, "limit", req.limit)?.min(self.config.limits.max_search_results);
        if req.query.is_empty() {
            return Err(fail(
                OP,
                WorkspaceError::InvalidArgument("search query must not be empty".to_string()),
            ));
        }

        let root = self.resolve(OP, "")?;
        let walk = WalkOptions {
            include: req.include_globs,
            exclude: req.exclude_globs,
            max_count: self.config.limits.max_index_files,
        };
        let request = SearchRequest {
            query: req.query,
            regex: req.regex,
            case_sensitive: req.case_sensitive,
            limit,
            max_file_bytes: self.config.limits.max_file_bytes,
        };
        let deadline = Deadline::after(Duration::from_millis(
            self.config.limits.search_time_budget_ms,
        ));

        let sandbox = Arc::clone(&self.sandbox);
        let outcome = self
            .pool
            .run(OP, move || search(&sandbox, &root, &walk, &request, deadline))
            .await
            .and_then(|r| r)
            .map_err(|e| fail(OP, e))?;

        Ok(RepoSearchResponse {
            matches: outcome.matches,
        })
    }

    // ── symbols.* / dep.graph ───────────────────────────────────────────

    /// `symbols.index`: rebuild and replace the symbol table.
    pub async fn symbols_index(&self, req: SymbolsIndexRequest) -> OpResult<SymbolsIndexResponse> {
        const OP: &str = "symbols.index";
        let roots = if req.paths.is_empty() {
            vec![self.resolve(OP, "")?]
        } else {
            req.paths
                .iter()
                .map(|p| self.resolve(OP, p))
                .collect::<OpResult<Vec<_>>>()?
        };
        let scope = IndexScope {
            roots,
            walk: WalkOptions {
                max_count: self.config.limits.max_index_files,
                ..WalkOptions::default()
            },
            languages: req.languages.iter().map(|l| Language::from_tag(l)).collect(),
            max_file_bytes: self.config.limits.max_file_bytes,
        };
        let deadline = self.index_deadline();

        let sandbox = Arc::clone(&self.sandbox);
        let store = Arc::clone(&self.store);
        let snapshot = self
            .pool
            .run(OP, move || store.rebuild_symbols(&sandbox, &scope, deadline))
            .await
            .and_then(|r| r)
            .map_err(|e| fail(OP, e))?;

        Ok(SymbolsIndexResponse {
            indexed_file_count: snapshot.indexed_files,
            symbols: snapshot.symbols.symbols().to_vec(),
            generation: snapshot.generation,
        })
    }

    /// `symbols.search`: filter the last published symbol table.
    pub async fn symbols_search(
        &self,
        req: SymbolsSearchRequest,
    ) -> OpResult<SymbolsSearchResponse> {
        const OP: &str = "symbols.search";
        let kind = req
            .kind
            .as_deref()
            .map(str::parse::<SymbolKind>)
            .transpose()
            .map_err(|msg| fail(OP, WorkspaceError::InvalidArgument(msg)))?;
        let query = SymbolQuery {
            kind,
            name: req.name.filter(|n| !n.is_empty()),
            language: req.language.as_deref().map(Language::from_tag),
        };
        Ok(SymbolsSearchResponse {
            symbols: self.store.query_symbols(&query),
        })
    }

    /// `dep.graph`: rebuild and replace the dependency graph.
    pub async fn dep_graph(&self, req: DepGraphRequest) -> OpResult<DepGraphResponse> {
        const OP: &str = "dep.graph";
        let root = self.resolve(OP, req.root.as_deref().unwrap_or(""))?;
        let scope = IndexScope {
            roots: vec![root],
            walk: WalkOptions {
                include: req.include_globs,
                exclude: req.exclude_globs,
                max_count: self.config.limits.max_index_files,
            },
            languages: Vec::new(),
            max_file_bytes: self.config.limits.max_file_bytes,
        };
        let deadline = self.index_deadline();

        let sandbox = Arc::clone(&self.sandbox);
        let store = Arc::clone(&self.store);
        let snapshot = self
            .pool
            .run(OP, move || store.rebuild_dep_graph(&sandbox, &scope, deadline))
            .await
            .and_then(|r| r)
            .map_err(|e| fail(OP, e))?;

        Ok((*snapshot.dep_graph).clone())
    }

    /// `health`: identity, mode and capabilities.
    pub fn health(&self) -> HealthResponse {
        let build = BuildInfo::current();
        HealthResponse {
            status: "ok".to_string(),
            workspace: self.config.workspace.name.clone(),
            read_only: self.config.workspace.read_only,
            capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            version: build.to_string(),
            build,
            index_generation: self.store.generation(),
            max_requests_per_minute: self.config.limits.max_requests_per_minute,
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn resolve(&self, op: &'static str, path: &str) -> OpResult<ResolvedPath> {
        self.sandbox.resolve(path).map_err(|e| fail(op, e))
    }

    fn ensure_writable(&self, op: &'static str) -> OpResult<()> {
        if self.config.workspace.read_only {
            warn!(operation = op, "Mutation rejected: workspace is read-only");
            return Err(fail(op, WorkspaceError::ReadOnly));
        }
        Ok(())
    }

    fn authorize(
        &self,
        op: &'static str,
        target: &ResolvedPath,
        operation: WriteOperation,
    ) -> OpResult<()> {
        if target.is_root() && operation == WriteOperation::Delete {
            return Err(self.denied(op, target, "the workspace root cannot be deleted".into()));
        }
        match self.policy.authorize(&target.relative, operation) {
            PolicyDecision::Allowed => Ok(()),
            PolicyDecision::Denied(reason) => Err(self.denied(op, target, reason)),
        }
    }

    fn denied(&self, op: &'static str, target: &ResolvedPath, reason: String) -> ServiceError {
        warn!(operation = op, path = %target.display_relative(), %reason, "Write policy denied");
        fail(
            op,
            WorkspaceError::PolicyDenied {
                path: target.relative.clone(),
                reason,
            },
        )
    }

    /// Index rebuilds read content like search does.
    fn index_deadline(&self) -> Deadline {
        Deadline::after(Duration::from_millis(
            self.config.limits.search_time_budget_ms,
        ))
    }
}

/// Workspace-relative location of the policy file, if it is inside the root.
fn policy_file_in_workspace(sandbox: &Sandbox, policy_file: &Path) -> Option<PathBuf> {
    if policy_file.is_absolute() {
        let canonical = policy_file
            .canonicalize()
            .unwrap_or_else(|_| policy_file.to_path_buf());
        sandbox.relativize(&canonical)
    } else {
        sandbox.resolve(policy_file).ok().map(|r| r.relative)
    }
}

fn fail(operation: &'static str, error: WorkspaceError) -> ServiceError {
    debug!(operation, kind = %error.kind(), error = %error, "Operation failed");
    ServiceError::new(operation, error)
}

fn non_negative(op: &'static str, field: &str, value: i64) -> OpResult<usize> {
    usize::try_from(value).map_err(|_| {
        fail(
            op,
            WorkspaceError::InvalidArgument(format!("{field} must not be negative, got {value}")),
        )
    })
}
