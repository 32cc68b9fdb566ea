//! Temporary workspace fixtures.
//!
//! [`TestWorkspace`] owns a temp directory, lets a test lay out files and a
//! policy file, and then builds a ready [`Service`] over it.

use std::path::{Path, PathBuf};

use burrow_config::AppConfig;
use burrow_core::Service;
use tempfile::TempDir;

use crate::config::TestConfigBuilder;

/// A test-scoped workspace root.
///
/// The temp directory is deleted automatically when this value is dropped,
/// guaranteeing cleanup even on panic.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write a file, creating parent directories.
    pub fn file(self, relative: &str, content: impl AsRef<[u8]>) -> Self {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&path, content).expect("failed to write fixture file");
        self
    }

    /// Write `.burrow/policy.toml`.
    pub fn policy(self, toml: &str) -> Self {
        self.file(".burrow/policy.toml", toml)
    }

    pub fn read(&self, relative: &str) -> Vec<u8> {
        std::fs::read(self.path(relative)).expect("failed to read fixture file")
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// A config builder already rooted at this workspace.
    pub fn config(&self) -> TestConfigBuilder {
        TestConfigBuilder::new().root(self.root())
    }

    /// A service with default limits over this workspace.
    pub async fn service(&self) -> Service {
        self.service_with(self.config().build()).await
    }

    pub async fn service_with(&self, config: AppConfig) -> Service {
        Service::from_config(config)
            .await
            .expect("failed to start workspace service")
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
