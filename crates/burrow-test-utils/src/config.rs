//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::Path;

use burrow_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .root(tmp.path())
///     .read_only(true)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.workspace.name = "test".to_string();
        Self { config }
    }

    pub fn root(mut self, root: &Path) -> Self {
        self.config.workspace.root = root.to_path_buf();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.workspace.name = name.to_string();
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.workspace.read_only = read_only;
        self
    }

    pub fn policy_file(mut self, path: &str) -> Self {
        self.config.workspace.policy_file = path.into();
        self
    }

    pub fn socket_path(mut self, path: &Path) -> Self {
        self.config.daemon.socket_path = path.display().to_string();
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn list_budget_ms(mut self, ms: u64) -> Self {
        self.config.limits.list_time_budget_ms = ms;
        self
    }

    pub fn search_budget_ms(mut self, ms: u64) -> Self {
        self.config.limits.search_time_budget_ms = ms;
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.limits.max_file_bytes = bytes;
        self
    }

    pub fn worker_threads(mut self, n: usize) -> Self {
        self.config.limits.worker_threads = n;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
