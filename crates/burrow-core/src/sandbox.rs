//! Path sandbox: every path a caller supplies is resolved here first.
//!
//! Resolution happens in two stages:
//!
//! 1. **Lexical**: the caller's path is joined to the root and `.`/`..` are
//!    folded without touching the filesystem. Anything that lands outside the
//!    root is rejected before a single syscall is made.
//! 2. **Canonical**: the deepest existing ancestor is canonicalized, which
//!    resolves symlinks, and must still sit under the canonical root.
//!
//! The result is a [`ResolvedPath`] that carries both the absolute location
//! and the normalized workspace-relative form used in every response.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, WorkspaceError};

/// A path that passed containment checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute path under the canonical root.
    pub absolute: PathBuf,
    /// Workspace-relative path. Empty for the root itself.
    pub relative: PathBuf,
}

impl ResolvedPath {
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    /// Relative path rendered with `/` separators, `.` for the root.
    pub fn display_relative(&self) -> String {
        to_slash(&self.relative)
    }
}

/// The containment boundary for one workspace.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at `root`. The root must exist and be a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|e| WorkspaceError::io(root, e))?;
        if !canonical.is_dir() {
            return Err(WorkspaceError::not_found(root, "workspace root is not a directory"));
        }
        Ok(Self { root: canonical })
    }

    /// Canonical workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied path.
    ///
    /// Absolute paths are accepted only when they already point inside the root.
    /// The target itself need not exist (writes create files).
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<ResolvedPath> {
        let requested = path.as_ref();
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };

        let Some(lexical) = normalize_lexically(&joined) else {
            return Err(self.escape(requested));
        };
        if !lexical.starts_with(&self.root) {
            return Err(self.escape(requested));
        }

        let canonical = canonicalize_existing_prefix(&lexical)
            .map_err(|e| WorkspaceError::io(requested, e))?;
        if !canonical.starts_with(&self.root) {
            return Err(self.escape(requested));
        }

        let relative = canonical
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .map_err(|_| self.escape(requested))?;

        Ok(ResolvedPath {
            absolute: canonical,
            relative,
        })
    }

    /// Resolve a path without following a symlink in its last component.
    ///
    /// The parent goes through [`Sandbox::resolve`]; the final name is kept as
    /// written, so a link inside the workspace resolves to the link itself.
    pub fn resolve_entry(&self, path: impl AsRef<Path>) -> Result<ResolvedPath> {
        let requested = path.as_ref();
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };
        let Some(lexical) = normalize_lexically(&joined) else {
            return Err(self.escape(requested));
        };
        if !lexical.starts_with(&self.root) {
            return Err(self.escape(requested));
        }
        if lexical == self.root {
            return self.resolve(requested);
        }
        let (Some(parent), Some(name)) = (lexical.parent(), lexical.file_name()) else {
            return Err(self.escape(requested));
        };

        let parent = self.resolve(parent)?;
        Ok(ResolvedPath {
            absolute: parent.absolute.join(name),
            relative: parent.relative.join(name),
        })
    }

    /// Whether an already-absolute path (e.g. from a directory walk) resolves
    /// inside the root after following symlinks.
    pub fn contains(&self, absolute: &Path) -> bool {
        absolute
            .canonicalize()
            .map(|c| c.starts_with(&self.root))
            .unwrap_or(false)
    }

    /// Workspace-relative form of an absolute path under the root.
    pub fn relativize(&self, absolute: &Path) -> Option<PathBuf> {
        absolute.strip_prefix(&self.root).ok().map(Path::to_path_buf)
    }

    fn escape(&self, requested: &Path) -> WorkspaceError {
        tracing::warn!(path = %requested.display(), "Rejected path outside workspace");
        WorkspaceError::PathEscape {
            path: requested.to_path_buf(),
        }
    }
}

/// Fold `.` and `..` without consulting the filesystem.
///
/// Returns `None` when `..` would climb above the filesystem root.
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

/// Canonicalize the deepest existing ancestor and re-append the rest.
///
/// Symlinks in the existing part are resolved; the missing tail is taken
/// verbatim (it cannot be a symlink yet).
fn canonicalize_existing_prefix(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut tail = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(canonical) => {
                let mut result = canonical;
                for part in tail.iter().rev() {
                    result.push(part);
                }
                return Ok(result);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let Some(name) = existing.file_name().map(|n| n.to_os_string()) else {
                    return Err(e);
                };
                tail.push(name);
                if !existing.pop() {
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Render a relative path with `/` separators; the empty path is `.`.
pub fn to_slash(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        return ".".to_string();
    }
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
