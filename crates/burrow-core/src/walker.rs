//! File enumerator: glob-driven, exclusion-aware, bounded directory walk.
//!
//! Enumeration has two independent stopping conditions: the result cap and
//! the time budget. Whichever fires first ends the walk and the entries
//! gathered so far are returned. Truncation is reported in
//! [`Enumeration::truncated`] but is never an error; callers that need
//! completeness must narrow their globs.
//!
//! Default exclusions (VCS metadata, dependency caches, build output, backup
//! archives) always apply. Caller excludes widen them; caller includes can
//! never re-admit a default-excluded path.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WorkspaceError};
use crate::lang::Language;
use crate::pool::Deadline;
use crate::sandbox::{ResolvedPath, Sandbox, to_slash};

/// Directory names that are never walked into.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    // Version control
    ".git",
    ".hg",
    ".svn",
    // Dependency caches
    "node_modules",
    "bower_components",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    ".cache",
    // Build output
    "dist",
    "build",
    "target",
    "out",
    ".next",
    "coverage",
    ".idea",
    // Service state, backups and archives
    ".burrow",
    "backups",
    ".backups",
    "archive",
    "archives",
];

/// File globs that are never returned.
pub const DEFAULT_EXCLUDED_FILES: &[&str] = &[
    "**/*.pyc", "**/*.pyo", "**/*.class", "**/*.o", "**/*.so", "**/*.bak", "**/*.zip",
    "**/*.tar", "**/*.gz",
];

/// One enumerated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Workspace-relative path with `/` separators.
    pub path: String,
    pub size: u64,
    pub language: Language,
}

/// Why an enumeration stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    Count,
    TimeBudget,
}

/// Result of a bounded walk.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub entries: Vec<FileEntry>,
    pub truncated: Option<TruncationReason>,
}

/// Walk parameters.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Globs relative to the walk root. Empty means every file.
    pub include: Vec<String>,
    /// Extra exclusions on top of the defaults.
    pub exclude: Vec<String>,
    pub max_count: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            max_count: usize::MAX,
        }
    }
}

/// Compiled include/exclude matchers.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include = if include.is_empty() {
            compile_globs(["**/*"])?
        } else {
            compile_globs(include)?
        };
        let exclude = compile_globs(
            DEFAULT_EXCLUDED_FILES
                .iter()
                .copied()
                .chain(exclude.iter().map(String::as_str)),
        )?;
        Ok(Self { include, exclude })
    }

    /// Decide whether a file is admitted.
    ///
    /// `walk_relative` is relative to the walk root, `workspace_relative` to
    /// the workspace root.
    pub fn admits(&self, walk_relative: &Path, workspace_relative: &Path) -> bool {
        !is_default_excluded(workspace_relative)
            && !self.exclude.is_match(walk_relative)
            && !self.exclude.is_match(workspace_relative)
            && self.include.is_match(walk_relative)
    }
}

/// Compile path globs. `*` stays within one directory, `**` crosses them.
pub fn compile_globs<I, S>(patterns: I) -> Result<GlobSet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| WorkspaceError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.kind().to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| WorkspaceError::InvalidPattern {
        pattern: String::new(),
        message: e.to_string(),
    })
}

/// Whether any component of a workspace-relative path is a default-excluded
/// directory name.
pub fn is_default_excluded(workspace_relative: &Path) -> bool {
    let components: Vec<_> = workspace_relative.components().collect();
    let dirs = components.len().saturating_sub(1);
    components[..dirs].iter().any(|c| match c {
        Component::Normal(name) => name
            .to_str()
            .is_some_and(|n| DEFAULT_EXCLUDED_DIRS.contains(&n)),
        _ => false,
    })
}

/// Enumerate files under `root` (already sandboxed).
pub fn enumerate(
    sandbox: &Sandbox,
    root: &ResolvedPath,
    options: &WalkOptions,
    deadline: Deadline,
) -> Result<Enumeration> {
    let filter = FileFilter::new(&options.include, &options.exclude)?;
    let mut out = Enumeration::default();
    if options.max_count == 0 {
        return Ok(out);
    }

    let metadata = std::fs::metadata(&root.absolute)
        .map_err(|e| WorkspaceError::io(&root.relative, e))?;
    if metadata.is_file() {
        // A single file: includes are meaningless, exclusions still hold.
        if !is_default_excluded(&root.relative) && !filter.exclude.is_match(&root.relative) {
            out.entries.push(file_entry(&root.relative, metadata.len()));
        }
        return Ok(out);
    }

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let walker = WalkBuilder::new(&root.absolute)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| DEFAULT_EXCLUDED_DIRS.contains(&n)))
        })
        .build();

    for result in walker {
        if deadline.expired() {
            out.truncated = Some(TruncationReason::TimeBudget);
            break;
        }

        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_none_or(|t| t.is_dir()) {
            continue;
        }

        let path = entry.path();
        // Follows symlinks: a link to a directory is not a file.
        let Ok(meta) = std::fs::metadata(path) else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }

        let Ok(canonical) = path.canonicalize() else {
            continue;
        };
        if !canonical.starts_with(sandbox.root()) {
            debug!(path = %path.display(), "Skipping symlink that leaves the workspace");
            continue;
        }

        let Some(workspace_relative) = sandbox.relativize(path) else {
            continue;
        };
        let walk_relative = path.strip_prefix(&root.absolute).unwrap_or(path);
        if !filter.admits(walk_relative, &workspace_relative) {
            continue;
        }
        if !seen.insert(canonical) {
            continue;
        }

        out.entries.push(file_entry(&workspace_relative, meta.len()));
        if out.entries.len() >= options.max_count {
            out.truncated = Some(TruncationReason::Count);
            break;
        }
    }

    if let Some(reason) = out.truncated {
        debug!(
            root = %root.display_relative(),
            count = out.entries.len(),
            ?reason,
            elapsed_ms = deadline.elapsed().as_millis() as u64,
            "Enumeration truncated"
        );
    }
    Ok(out)
}

fn file_entry(workspace_relative: &Path, size: u64) -> FileEntry {
    FileEntry {
        path: to_slash(workspace_relative),
        size,
        language: Language::classify(workspace_relative),
    }
}

/// Convenience budget for tests and one-shot callers.
pub fn budget_ms(ms: u64) -> Deadline {
    Deadline::after(Duration::from_millis(ms))
}
