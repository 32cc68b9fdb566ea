//! Write policy engine: allow/deny path prefixes and backup-on-write.
//!
//! A [`WritePolicy`] is built once from the workspace policy file and never
//! changes at runtime. Every `write` and `delete` consults
//! [`WritePolicy::authorize`] after the path has been sandboxed.
//!
//! Evaluation:
//!
//! 1. A path under any denied prefix is rejected.
//! 2. With an empty allow list every remaining path is permitted (default-open).
//! 3. Otherwise the path must sit under at least one allowed prefix
//!    (default-closed).
//!
//! Prefixes are workspace-relative and compared on whole path components, so
//! `src` covers `src/a.py` but not `srcs/a.py`.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// The mutation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Write,
    Delete,
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOperation::Write => write!(f, "write"),
            WriteOperation::Delete => write!(f, "delete"),
        }
    }
}

/// The result of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The mutation may proceed.
    Allowed,
    /// The mutation is rejected, with a human-readable reason.
    Denied(String),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allowed)
    }
}

/// Compiled write policy for one workspace.
#[derive(Debug, Clone, Default)]
pub struct WritePolicy {
    allowed: Vec<PathBuf>,
    denied: Vec<PathBuf>,
    backup_on_write: bool,
}

impl WritePolicy {
    /// Create a policy from raw prefix strings.
    pub fn new<A, D>(allowed: A, denied: D, backup_on_write: bool) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|p| normalize_prefix(p.as_ref()))
                .collect(),
            denied: denied
                .into_iter()
                .map(|p| normalize_prefix(p.as_ref()))
                .collect(),
            backup_on_write,
        }
    }

    /// The default-open policy: no allow list, no deny list, no backups.
    pub fn open() -> Self {
        Self::default()
    }

    /// Add a denied prefix.
    pub fn deny_prefix(&mut self, prefix: &str) {
        let prefix = normalize_prefix(prefix);
        if !self.denied.contains(&prefix) {
            self.denied.push(prefix);
        }
    }

    /// Whether a sibling backup must be written before overwriting a file.
    pub fn backup_on_write(&self) -> bool {
        self.backup_on_write
    }

    pub fn allowed_prefixes(&self) -> &[PathBuf] {
        &self.allowed
    }

    pub fn denied_prefixes(&self) -> &[PathBuf] {
        &self.denied
    }

    /// Evaluate a mutation of the workspace-relative `path`.
    pub fn authorize(&self, path: &Path, operation: WriteOperation) -> PolicyDecision {
        let path = normalize_relative(path);

        if let Some(prefix) = self.denied.iter().find(|p| covers(p, &path)) {
            return PolicyDecision::Denied(format!(
                "{operation} of '{}' matches denied prefix '{}'",
                path.display(),
                display_prefix(prefix)
            ));
        }

        // A delete takes everything below the target with it.
        if operation == WriteOperation::Delete
            && let Some(prefix) = self.denied.iter().find(|p| p.starts_with(&path))
        {
            return PolicyDecision::Denied(format!(
                "{operation} of '{}' would remove denied path '{}'",
                display_prefix(&path),
                display_prefix(prefix)
            ));
        }

        if self.allowed.is_empty() || self.allowed.iter().any(|p| covers(p, &path)) {
            PolicyDecision::Allowed
        } else {
            PolicyDecision::Denied(format!(
                "{operation} of '{}' is outside every allowed prefix",
                path.display()
            ))
        }
    }
}

/// Whether `prefix` covers `path` on component boundaries.
fn covers(prefix: &Path, path: &Path) -> bool {
    prefix.as_os_str().is_empty() || path.starts_with(prefix)
}

fn display_prefix(prefix: &Path) -> String {
    if prefix.as_os_str().is_empty() {
        ".".to_string()
    } else {
        prefix.display().to_string()
    }
}

/// Normalise a configured prefix: `./src/`, `/src` and `src` are the same.
fn normalize_prefix(prefix: &str) -> PathBuf {
    normalize_relative(Path::new(prefix.trim()))
}

/// Drop root and `.` components; keep everything else verbatim.
fn normalize_relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_policy_allows_everything() {
        let policy = WritePolicy::open();
        assert!(
            policy
                .authorize(Path::new("src/a.py"), WriteOperation::Write)
                .is_allowed()
        );
        assert!(
            policy
                .authorize(Path::new("README.md"), WriteOperation::Delete)
                .is_allowed()
        );
        assert!(!policy.backup_on_write());
    }

    #[test]
    fn test_deny_prefix_blocks_subtree() {
        let policy = WritePolicy::new(Vec::<&str>::new(), ["secrets"], false);
        let decision = policy.authorize(Path::new("secrets/key.pem"), WriteOperation::Write);
        assert!(matches!(decision, PolicyDecision::Denied(ref r) if r.contains("secrets")));
        assert!(
            !policy
                .authorize(Path::new("secrets"), WriteOperation::Delete)
                .is_allowed()
        );
    }

    #[test]
    fn test_delete_of_ancestor_of_denied_prefix() {
        let policy = WritePolicy::new(Vec::<&str>::new(), ["src/generated"], false);
        let decision = policy.authorize(Path::new("src"), WriteOperation::Delete);
        assert!(matches!(decision, PolicyDecision::Denied(ref r) if r.contains("src/generated")));
        assert!(
            !policy
                .authorize(Path::new(""), WriteOperation::Delete)
                .is_allowed()
        );
        // Writing next to the denied subtree, or deleting a sibling, is fine.
        assert!(
            policy
                .authorize(Path::new("src"), WriteOperation::Write)
                .is_allowed()
        );
        assert!(
            policy
                .authorize(Path::new("src/lib"), WriteOperation::Delete)
                .is_allowed()
        );
    }

    #[test]
    fn test_prefix_matches_whole_components() {
        let policy = WritePolicy::new(Vec::<&str>::new(), ["src"], false);
        assert!(
            !policy
                .authorize(Path::new("src/a.py"), WriteOperation::Write)
                .is_allowed()
        );
        assert!(
            policy
                .authorize(Path::new("srcs/a.py"), WriteOperation::Write)
                .is_allowed()
        );
    }

    #[test]
    fn test_allow_list_is_default_closed() {
        let policy = WritePolicy::new(["src", "docs"], Vec::<&str>::new(), false);
        assert!(
            policy
                .authorize(Path::new("src/lib/a.py"), WriteOperation::Write)
                .is_allowed()
        );
        assert!(
            policy
                .authorize(Path::new("docs/index.md"), WriteOperation::Write)
                .is_allowed()
        );
        let decision = policy.authorize(Path::new("setup.py"), WriteOperation::Write);
        assert!(matches!(decision, PolicyDecision::Denied(ref r) if r.contains("allowed")));
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let policy = WritePolicy::new(["src"], ["src/generated"], false);
        assert!(
            policy
                .authorize(Path::new("src/app.py"), WriteOperation::Write)
                .is_allowed()
        );
        assert!(
            !policy
                .authorize(Path::new("src/generated/pb.py"), WriteOperation::Write)
                .is_allowed()
        );
    }

    #[test]
    fn test_prefix_normalization() {
        let policy = WritePolicy::new(["./src/"], ["/build"], true);
        assert_eq!(policy.allowed_prefixes(), &[PathBuf::from("src")]);
        assert_eq!(policy.denied_prefixes(), &[PathBuf::from("build")]);
        assert!(
            policy
                .authorize(Path::new("./src/a.py"), WriteOperation::Write)
                .is_allowed()
        );
        assert!(policy.backup_on_write());
    }

    #[test]
    fn test_root_prefix_covers_everything() {
        let policy = WritePolicy::new(Vec::<&str>::new(), ["."], false);
        assert!(
            !policy
                .authorize(Path::new("anything/at/all.txt"), WriteOperation::Write)
                .is_allowed()
        );
    }

    #[test]
    fn test_deny_prefix_added_once() {
        let mut policy = WritePolicy::open();
        policy.deny_prefix(".burrow/policy.toml");
        policy.deny_prefix("./.burrow/policy.toml");
        assert_eq!(policy.denied_prefixes().len(), 1);
        assert!(
            !policy
                .authorize(Path::new(".burrow/policy.toml"), WriteOperation::Write)
                .is_allowed()
        );
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(WriteOperation::Write.to_string(), "write");
        assert_eq!(WriteOperation::Delete.to_string(), "delete");
    }
}
