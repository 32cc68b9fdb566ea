#![deny(unsafe_code)]

//! Configuration loading, validation, and write policy for burrow.
//!
//! Loads the daemon's TOML configuration ([`AppConfig`]) and the per-workspace
//! policy file ([`WritePolicyConfig`]). Both are read once at startup and are
//! immutable afterwards; edits take effect on restart.

/// Write policy engine (allow/deny prefixes, backup-on-write).
pub mod policy;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use policy::{PolicyDecision, WriteOperation, WritePolicy};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level daemon configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The workspace this instance is scoped to.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Daemon / IPC configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Operational limits and time budgets.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Workspace scoping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory. Every path a caller supplies is resolved against it.
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,

    /// Display name reported by `health`.
    #[serde(default = "default_workspace_name")]
    pub name: String,

    /// Reject every write and delete when set.
    #[serde(default)]
    pub read_only: bool,

    /// Policy file, relative to `root` unless absolute.
    #[serde(default = "default_policy_file")]
    pub policy_file: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            name: default_workspace_name(),
            read_only: false,
            policy_file: default_policy_file(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_workspace_name() -> String {
    "default".to_string()
}

fn default_policy_file() -> PathBuf {
    PathBuf::from(".burrow/policy.toml")
}

impl WorkspaceConfig {
    /// Absolute-or-root-relative location of the policy file.
    pub fn policy_path(&self) -> PathBuf {
        if self.policy_file.is_absolute() {
            self.policy_file.clone()
        } else {
            self.root.join(&self.policy_file)
        }
    }
}

/// Configuration for the daemon's IPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Unix socket the daemon listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
        }
    }
}

fn default_socket_path() -> String {
    "/tmp/burrow.sock".to_string()
}

/// Operational limits.
///
/// Time budgets bound how long a single enumeration or search may run before
/// it returns whatever it has collected so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Requests per minute per caller. Enforced by the outer throttling layer.
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,

    /// Ceiling for non-mutating requests at the transport.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Wall-clock budget for plain enumeration (`repo.list`, index scopes).
    #[serde(default = "default_list_time_budget_ms")]
    pub list_time_budget_ms: u64,

    /// Wall-clock budget for content search.
    #[serde(default = "default_search_time_budget_ms")]
    pub search_time_budget_ms: u64,

    /// Hard cap on the `limit` accepted by `repo.list`.
    #[serde(default = "default_max_list_results")]
    pub max_list_results: usize,

    /// Hard cap on the `limit` accepted by `repo.search`.
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    /// Enumeration cap for `symbols.index` and `dep.graph`.
    #[serde(default = "default_max_index_files")]
    pub max_index_files: usize,

    /// Files larger than this are skipped by search and indexing.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Size of the blocking worker pool.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: default_max_requests_per_minute(),
            request_timeout_secs: default_request_timeout_secs(),
            list_time_budget_ms: default_list_time_budget_ms(),
            search_time_budget_ms: default_search_time_budget_ms(),
            max_list_results: default_max_list_results(),
            max_search_results: default_max_search_results(),
            max_index_files: default_max_index_files(),
            max_file_bytes: default_max_file_bytes(),
            worker_threads: default_worker_threads(),
        }
    }
}

fn default_max_requests_per_minute() -> u32 {
    120
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_list_time_budget_ms() -> u64 {
    5_000
}

fn default_search_time_budget_ms() -> u64 {
    8_000
}

fn default_max_list_results() -> usize {
    10_000
}

fn default_max_search_results() -> usize {
    2_000
}

fn default_max_index_files() -> usize {
    20_000
}

fn default_max_file_bytes() -> u64 {
    2 * 1024 * 1024 // 2 MiB
}

fn default_worker_threads() -> usize {
    4
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workspace.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "workspace.name must not be empty".to_string(),
            ));
        }
        if self.workspace.root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "workspace.root must not be empty".to_string(),
            ));
        }
        if self.daemon.socket_path.is_empty() {
            return Err(ConfigError::Validation(
                "daemon.socket_path must not be empty".to_string(),
            ));
        }

        let limits = &self.limits;
        let non_zero = [
            ("limits.request_timeout_secs", limits.request_timeout_secs),
            ("limits.list_time_budget_ms", limits.list_time_budget_ms),
            ("limits.search_time_budget_ms", limits.search_time_budget_ms),
            ("limits.max_list_results", limits.max_list_results as u64),
            ("limits.max_search_results", limits.max_search_results as u64),
            ("limits.max_index_files", limits.max_index_files as u64),
            ("limits.max_file_bytes", limits.max_file_bytes),
            ("limits.worker_threads", limits.worker_threads as u64),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "{name} must be non-zero"
                )));
            }
        }

        Ok(())
    }
}

/// The declarative per-workspace policy file.
///
/// ## TOML Example
///
/// ```toml
/// write_allowed_paths = ["src", "docs"]
/// write_denied_paths = ["src/generated"]
/// backup_on_write = true
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct WritePolicyConfig {
    /// When non-empty, writes must fall under one of these prefixes.
    #[serde(default)]
    pub write_allowed_paths: Vec<String>,

    /// Writes under any of these prefixes are always rejected.
    #[serde(default)]
    pub write_denied_paths: Vec<String>,

    /// Keep a sibling `.bak` copy before overwriting an existing file.
    #[serde(default)]
    pub backup_on_write: bool,
}

impl WritePolicyConfig {
    /// Load the policy file. A missing file yields the default-open policy.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No policy file, using open policy");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Parse a policy file from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: WritePolicyConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the prefixes. Prefixes may not climb out of the workspace.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lists = [
            ("write_allowed_paths", &self.write_allowed_paths),
            ("write_denied_paths", &self.write_denied_paths),
        ];
        for (name, list) in lists {
            for (i, prefix) in list.iter().enumerate() {
                if Path::new(prefix)
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir))
                {
                    return Err(ConfigError::Validation(format!(
                        "{name}[{i}] must not contain '..', got {prefix:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Compile into a [`WritePolicy`].
    pub fn build_policy(&self) -> WritePolicy {
        WritePolicy::new(
            &self.write_allowed_paths,
            &self.write_denied_paths,
            self.backup_on_write,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.workspace.root, PathBuf::from("."));
        assert_eq!(config.workspace.name, "default");
        assert!(!config.workspace.read_only);
        assert_eq!(config.daemon.socket_path, "/tmp/burrow.sock");
        assert_eq!(config.limits.list_time_budget_ms, 5_000);
        assert_eq!(config.limits.search_time_budget_ms, 8_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.limits.max_list_results, 10_000);
        assert_eq!(config.limits.worker_threads, 4);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [workspace]
            root = "/srv/repo"
            name = "api"
            read_only = true
            policy_file = "/etc/burrow/policy.toml"

            [daemon]
            socket_path = "/run/burrow.sock"

            [limits]
            max_requests_per_minute = 60
            request_timeout_secs = 10
            list_time_budget_ms = 1000
            search_time_budget_ms = 1500
            max_list_results = 500
            max_search_results = 100
            max_index_files = 50
            max_file_bytes = 4096
            worker_threads = 2

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.workspace.root, PathBuf::from("/srv/repo"));
        assert_eq!(config.workspace.name, "api");
        assert!(config.workspace.read_only);
        assert_eq!(
            config.workspace.policy_path(),
            PathBuf::from("/etc/burrow/policy.toml")
        );
        assert_eq!(config.daemon.socket_path, "/run/burrow.sock");
        assert_eq!(config.limits.max_requests_per_minute, 60);
        assert_eq!(config.limits.search_time_budget_ms, 1500);
        assert_eq!(config.limits.worker_threads, 2);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_policy_path_relative_to_root() {
        let toml = r#"
            [workspace]
            root = "/srv/repo"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(
            config.workspace.policy_path(),
            PathBuf::from("/srv/repo/.burrow/policy.toml")
        );
    }

    #[test]
    fn test_validation_rejects_empty_name() {
        let toml = r#"
            [workspace]
            name = "  "
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_socket() {
        let toml = r#"
            [daemon]
            socket_path = ""
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        for field in [
            "request_timeout_secs",
            "list_time_budget_ms",
            "search_time_budget_ms",
            "max_list_results",
            "max_search_results",
            "max_index_files",
            "max_file_bytes",
            "worker_threads",
        ] {
            let toml = format!("[limits]\n{field} = 0\n");
            let err = AppConfig::parse(&toml).unwrap_err();
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }

    // ── Policy file ───────────────────────────────────────────────────

    #[test]
    fn test_policy_file_from_toml() {
        let toml = r#"
            write_allowed_paths = ["src", "docs"]
            write_denied_paths = ["src/generated"]
            backup_on_write = true
        "#;
        let config = WritePolicyConfig::parse(toml).unwrap();
        assert_eq!(config.write_allowed_paths, vec!["src", "docs"]);
        assert!(config.backup_on_write);

        let policy = config.build_policy();
        assert!(
            policy
                .authorize(Path::new("src/a.py"), WriteOperation::Write)
                .is_allowed()
        );
        assert!(
            !policy
                .authorize(Path::new("src/generated/a.py"), WriteOperation::Write)
                .is_allowed()
        );
        assert!(
            !policy
                .authorize(Path::new("Makefile"), WriteOperation::Write)
                .is_allowed()
        );
        assert!(policy.backup_on_write());
    }

    #[test]
    fn test_empty_policy_file_is_open() {
        let config = WritePolicyConfig::parse("").unwrap();
        let policy = config.build_policy();
        assert!(policy.allowed_prefixes().is_empty());
        assert!(policy.denied_prefixes().is_empty());
        assert!(!policy.backup_on_write());
    }

    #[test]
    fn test_policy_rejects_parent_prefix() {
        let toml = r#"write_denied_paths = ["../outside"]"#;
        assert!(WritePolicyConfig::parse(toml).is_err());
    }

    #[test]
    fn test_policy_rejects_wrong_type() {
        let toml = r#"backup_on_write = "yes""#;
        assert!(matches!(
            WritePolicyConfig::parse(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("burrow.toml");
        tokio::fs::write(&path, b"[workspace]\nname = \"svc\"\nread_only = true\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.workspace.name, "svc");
        assert!(config.workspace.read_only);
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/burrow.toml")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = AppConfig::load(&path).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_policy_file_is_open() {
        let tmp = TempDir::new().unwrap();
        let config = WritePolicyConfig::load(&tmp.path().join("policy.toml"))
            .await
            .unwrap();
        assert!(config.write_allowed_paths.is_empty());
        assert!(!config.backup_on_write);
    }

    #[tokio::test]
    async fn test_load_policy_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("policy.toml");
        tokio::fs::write(&path, b"write_denied_paths = [\"vendor\"]\n")
            .await
            .unwrap();

        let config = WritePolicyConfig::load(&path).await.unwrap();
        assert_eq!(config.write_denied_paths, vec!["vendor"]);
    }
}
