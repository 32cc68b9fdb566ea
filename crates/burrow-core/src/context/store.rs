//! Index store: the last completed symbol table and dependency graph.
//!
//! Rebuilds run without holding any lock: they enumerate the scope, extract
//! per file, and only then publish. Publishing takes a short writer lock,
//! bumps the generation and swaps the snapshot pointer. Readers never lock;
//! they always see one complete generation.
//!
//! `symbols.index` and `dep.graph` each replace their own half wholesale and
//! carry the other half forward. Two overlapping rebuilds race: the one that
//! publishes last wins.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tracing::{debug, info};

use super::deps::{DependencyGraph, extract_deps};
use super::indexer::{Symbol, SymbolQuery, SymbolTable, extract_symbols};
use crate::error::Result;
use crate::files::load_text;
use crate::lang::{Language, Strategy};
use crate::pool::Deadline;
use crate::sandbox::{ResolvedPath, Sandbox};
use crate::walker::{FileEntry, TruncationReason, WalkOptions, enumerate};

/// One published generation of the index.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    /// Monotonically increasing; 0 until the first publish.
    pub generation: u64,
    pub symbols: Arc<SymbolTable>,
    /// Files processed by the last `symbols.index`.
    pub indexed_files: usize,
    pub dep_graph: Arc<DependencyGraph>,
}

/// What a rebuild covers.
#[derive(Debug, Clone)]
pub struct IndexScope {
    /// Enumeration roots, already sandboxed. Overlaps are de-duplicated.
    pub roots: Vec<ResolvedPath>,
    pub walk: WalkOptions,
    /// Only index these languages. Empty means every supported language.
    pub languages: Vec<Language>,
    /// Files above this size are skipped.
    pub max_file_bytes: u64,
}

/// Holder of the current [`IndexSnapshot`].
#[derive(Debug)]
pub struct IndexStore {
    current: ArcSwap<IndexSnapshot>,
    publish: Mutex<()>,
}

impl Default for IndexStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(IndexSnapshot::default()),
            publish: Mutex::new(()),
        }
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Enumerate `scope`, extract symbols, and replace the symbol table.
    pub fn rebuild_symbols(
        &self,
        sandbox: &Sandbox,
        scope: &IndexScope,
        deadline: Deadline,
    ) -> Result<Arc<IndexSnapshot>> {
        let files = collect_scope(sandbox, scope, deadline)?;
        let mut table = SymbolTable::new();
        let mut indexed = 0usize;

        for entry in &files {
            if deadline.expired() {
                debug!(indexed, "Symbol extraction stopped at time budget");
                break;
            }
            let Some(content) = load_text(&sandbox.root().join(&entry.path), scope.max_file_bytes)
            else {
                continue;
            };
            table.insert_file(extract_symbols(&entry.path, &content, &entry.language));
            indexed += 1;
        }

        info!(files = indexed, summary = %table.summary(), "Symbol index rebuilt");
        Ok(self.publish(|prev| IndexSnapshot {
            generation: prev.generation + 1,
            symbols: Arc::new(table),
            indexed_files: indexed,
            dep_graph: Arc::clone(&prev.dep_graph),
        }))
    }

    /// Enumerate `scope`, extract imports, and replace the dependency graph.
    pub fn rebuild_dep_graph(
        &self,
        sandbox: &Sandbox,
        scope: &IndexScope,
        deadline: Deadline,
    ) -> Result<Arc<IndexSnapshot>> {
        let files = collect_scope(sandbox, scope, deadline)?;
        let mut graph = DependencyGraph::default();

        for entry in &files {
            if deadline.expired() {
                debug!(nodes = graph.nodes.len(), "Dependency scan stopped at time budget");
                break;
            }
            let Some(content) = load_text(&sandbox.root().join(&entry.path), scope.max_file_bytes)
            else {
                continue;
            };
            graph.add_file(&entry.path, extract_deps(&content, &entry.language));
        }

        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Dependency graph rebuilt"
        );
        Ok(self.publish(|prev| IndexSnapshot {
            generation: prev.generation + 1,
            symbols: Arc::clone(&prev.symbols),
            indexed_files: prev.indexed_files,
            dep_graph: Arc::new(graph),
        }))
    }

    /// Query the current symbol table.
    pub fn query_symbols(&self, query: &SymbolQuery) -> Vec<Symbol> {
        let snapshot = self.current.load();
        snapshot
            .symbols
            .search(query)
            .into_iter()
            .cloned()
            .collect()
    }

    fn publish(&self, next: impl FnOnce(&IndexSnapshot) -> IndexSnapshot) -> Arc<IndexSnapshot> {
        // Poisoned only if a publisher panicked mid-closure; nothing was stored.
        let _guard = self.publish.lock().unwrap_or_else(|e| e.into_inner());
        let prev = self.current.load_full();
        let next = Arc::new(next(&prev));
        self.current.store(Arc::clone(&next));
        debug!(generation = next.generation, "Index snapshot published");
        next
    }
}

/// Enumerate every root in `scope`, keep supported languages, drop overlaps.
fn collect_scope(
    sandbox: &Sandbox,
    scope: &IndexScope,
    deadline: Deadline,
) -> Result<Vec<FileEntry>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    let mut remaining = scope.walk.max_count;

    for root in &scope.roots {
        if remaining == 0 || deadline.expired() {
            break;
        }
        let options = WalkOptions {
            max_count: remaining,
            ..scope.walk.clone()
        };
        let enumeration = enumerate(sandbox, root, &options, deadline)?;
        for entry in enumeration.entries {
            if !wanted(&entry.language, &scope.languages) || !seen.insert(entry.path.clone()) {
                continue;
            }
            files.push(entry);
        }
        remaining = scope.walk.max_count.saturating_sub(files.len());
        if enumeration.truncated == Some(TruncationReason::TimeBudget) {
            break;
        }
    }
    Ok(files)
}

fn wanted(language: &Language, filter: &[Language]) -> bool {
    language.strategy() != Strategy::Unsupported
        && (filter.is_empty() || filter.contains(language))
}

/// Convenience for a whole-workspace scope.
pub fn workspace_scope(sandbox: &Sandbox, max_files: usize, max_file_bytes: u64) -> IndexScope {
    IndexScope {
        roots: vec![ResolvedPath {
            absolute: sandbox.root().to_path_buf(),
            relative: PathBuf::new(),
        }],
        walk: WalkOptions {
            max_count: max_files,
            ..WalkOptions::default()
        },
        languages: Vec::new(),
        max_file_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::indexer::SymbolKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fixture(files: &[(&str, &str)]) -> (TempDir, Sandbox) {
        let tmp = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = tmp.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let sandbox = Sandbox::new(tmp.path()).unwrap();
        (tmp, sandbox)
    }

    #[test]
    fn test_rebuild_symbols_publishes_generation() {
        let (_tmp, sandbox) = fixture(&[
            ("src/a.py", "def foo():\n    pass\n"),
            ("web/app.js", "export function render() {}\n"),
            ("README.md", "# readme\n"),
        ]);
        let store = IndexStore::new();
        assert_eq!(store.generation(), 0);

        let scope = workspace_scope(&sandbox, 100, 1 << 20);
        let snap = store
            .rebuild_symbols(&sandbox, &scope, Deadline::unbounded())
            .unwrap();
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.indexed_files, 2);

        let names: Vec<_> = snap.symbols.symbols().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["foo", "render"]);
        assert_eq!(snap.symbols.symbols()[0].file, "src/a.py");
        assert_eq!(snap.symbols.symbols()[0].line, 1);
    }

    #[test]
    fn test_rebuild_replaces_instead_of_merging() {
        let (tmp, sandbox) = fixture(&[("a.py", "def first():\n    pass\n")]);
        let store = IndexStore::new();
        let scope = workspace_scope(&sandbox, 100, 1 << 20);

        store
            .rebuild_symbols(&sandbox, &scope, Deadline::unbounded())
            .unwrap();
        std::fs::write(tmp.path().join("a.py"), "def second():\n    pass\n").unwrap();
        store
            .rebuild_symbols(&sandbox, &scope, Deadline::unbounded())
            .unwrap();

        let all = store.query_symbols(&SymbolQuery::default());
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "second");
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_halves_carry_forward() {
        let (_tmp, sandbox) = fixture(&[("a.py", "import os\n\nclass A:\n    pass\n")]);
        let store = IndexStore::new();
        let scope = workspace_scope(&sandbox, 100, 1 << 20);

        store
            .rebuild_symbols(&sandbox, &scope, Deadline::unbounded())
            .unwrap();
        let snap = store
            .rebuild_dep_graph(&sandbox, &scope, Deadline::unbounded())
            .unwrap();

        assert_eq!(snap.generation, 2);
        assert_eq!(snap.symbols.len(), 1);
        assert_eq!(snap.dep_graph.nodes, vec!["a.py"]);
        assert_eq!(snap.dep_graph.dependencies_of("a.py"), vec!["os"]);

        let classes = store.query_symbols(&SymbolQuery {
            kind: Some(SymbolKind::Class),
            ..Default::default()
        });
        assert_eq!(classes.len(), 1);
    }

    #[test]
    fn test_language_filter_and_overlapping_roots() {
        let (_tmp, sandbox) = fixture(&[
            ("src/a.py", "def a():\n    pass\n"),
            ("src/b.ts", "function b() {}\n"),
        ]);
        let store = IndexStore::new();
        let mut scope = workspace_scope(&sandbox, 100, 1 << 20);
        scope.roots.push(sandbox.resolve("src").unwrap());
        scope.languages = vec![Language::TypeScript];

        let snap = store
            .rebuild_symbols(&sandbox, &scope, Deadline::unbounded())
            .unwrap();
        assert_eq!(snap.indexed_files, 1);
        assert_eq!(snap.symbols.symbols()[0].name, "b");
    }

    #[test]
    fn test_oversized_and_broken_files_are_skipped() {
        let big = format!("def big():\n    pass\n{}", "#".repeat(4096));
        let (_tmp, sandbox) = fixture(&[
            ("big.py", big.as_str()),
            ("broken.py", "def broken(:\n"),
            ("ok.py", "def ok():\n    pass\n"),
        ]);
        let store = IndexStore::new();
        let scope = workspace_scope(&sandbox, 100, 1024);

        let snap = store
            .rebuild_symbols(&sandbox, &scope, Deadline::unbounded())
            .unwrap();
        let names: Vec<_> = snap.symbols.symbols().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["ok"]);
    }
}
